mod platform;

fn main() -> anyhow::Result<()> {
    platform::app::run_app()
}
