//! Command handlers.

pub mod convert;
pub mod migrate;
pub mod status;
pub mod sync;

/// Print shell completions to stdout.
pub fn print_completions(shell: clap_complete::Shell) {
    let mut command = crate::command_factory();
    let name = command.get_name().to_string();
    clap_complete::generate(shell, &mut command, name, &mut std::io::stdout());
}
