use studyflow::cli;
use studyflow::config::CONFIG;
use tracing_subscriber::EnvFilter;

fn main() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).with_target(false).init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let result = cli::parse_args(&args).and_then(|parsed| cli::execute(&parsed, &CONFIG));
    match result {
        Ok(out) => println!("{out}"),
        Err(e) => {
            eprintln!("[studyflow] {e}");
            std::process::exit(e.exit_code());
        }
    }
}
