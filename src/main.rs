fn main() -> anyhow::Result<()> {
    video_downloader_lib::run()
}
