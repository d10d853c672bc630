mod cli;
mod jq_exec;

fn main() -> anyhow::Result<()> {
    let command_line_interface = cli::CommandLineInterface::load();
    skein_forms::logging::init_logging(command_line_interface.verbose);
    command_line_interface.run()
}
