use burrow::commands::command_argument_builder;
use burrow::handlers;
use colored::Colorize;

#[tokio::main]
async fn main() {
    let matches = command_argument_builder().get_matches();

    if let Err(e) = handlers::run(&matches).await {
        eprintln!("{} {:#}", "Error:".bright_red().bold(), e);
        std::process::exit(1);
    }
}
