use prompt_master::cli::commands::run;

fn main() -> anyhow::Result<()> {
    run()
}
