fn main() -> anyhow::Result<()> {
    encore_lib::run()
}
