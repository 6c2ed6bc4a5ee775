fn main() {
    radar_camera_converter::cli::run();
}
