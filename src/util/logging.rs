use log::LevelFilter;

// `RUST_LOG` still overrides everything set here.
pub fn configure(
    root_module: &str,
    verbose: bool,
) {
    let level = if verbose {
        LevelFilter::Trace
    } else {
        LevelFilter::Debug
    };

    env_logger::Builder::new()
        .filter_level(LevelFilter::Info)
        .filter_module("shutter_motion", level)
        .filter_module(root_module, level)
        .parse_default_env()
        .init();
}
