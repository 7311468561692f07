pub mod ast;
pub mod clang;
pub mod cli;
pub mod config;
pub mod descriptor;
pub mod diag;
pub mod normalize;
pub mod walker;

fn main() -> anyhow::Result<()> {
    let command_line_interface = cli::CommandLineInterface::load();
    command_line_interface.run()
}
