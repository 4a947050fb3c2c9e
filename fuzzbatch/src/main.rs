fn main() -> anyhow::Result<()> {
    fuzzbatch::run()
}
