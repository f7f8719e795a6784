use colored::Colorize;
use kg_cwl::core::redact::redact_string;

fn main() {
    if let Err(e) = kg_cwl::run() {
        eprintln!(
            "{} {}",
            "Error:".bright_red().bold(),
            redact_string(&e.to_string())
        );
        std::process::exit(1);
    }
}
