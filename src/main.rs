fn main() -> anyhow::Result<()> {
    nutrizen_widget_lib::run()
}
