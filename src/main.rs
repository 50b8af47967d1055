fn main() {
    env_logger::init();
    if let Err(err) = starmap_renderer::run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
