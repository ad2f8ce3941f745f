use rx_app::app::{run, AppConfig};
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let result = AppConfig::from_env().and_then(|config| run(&config));
    match result {
        Ok(effects) => match serde_json::to_string_pretty(&effects) {
            Ok(json) => println!("{json}"),
            Err(err) => eprintln!("Failed to encode effects: {err}"),
        },
        Err(err) => {
            eprintln!("Failed to run reminder: {err:#}");
            std::process::exit(1);
        }
    }
}
