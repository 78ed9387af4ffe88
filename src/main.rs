use certlist::cli::{handle_command, Cli};
use certlist::utils::crash::write_crash_note;
use certlist::utils::errors::Result;

#[tokio::main]
async fn main() -> Result<()> {
    use clap::Parser;
    let cli = Cli::parse();
    let writes_crash_note = matches!(cli.command, certlist::args::Commands::Run(_));

    if let Err(e) = handle_command(cli).await {
        eprintln!("Error: {e}");
        if writes_crash_note {
            match write_crash_note(std::path::Path::new("."), &e) {
                Ok(path) => eprintln!("Details written to {}", path.display()),
                Err(note_error) => tracing::warn!("Failed to write crash note: {note_error}"),
            }
        }
        std::process::exit(1);
    }

    Ok(())
}
