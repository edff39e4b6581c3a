//! Basic mirror example: copy a tree, then prune what the source dropped

use std::error::Error;
use treesync::{LogChannel, ProgressChannel, ProgressEvent, SyncEngine, SyncOptions, TaskConfig, TaskFile};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt::init();

    println!("Basic Treesync Example");
    println!("======================");

    let temp_dir = tempfile::TempDir::new()?;
    let source_dir = temp_dir.path().join("source");
    let dest_dir = temp_dir.path().join("destination");

    tokio::fs::create_dir_all(source_dir.join("subdir")).await?;
    tokio::fs::write(source_dir.join("file1.txt"), b"This is file 1 content").await?;
    tokio::fs::write(source_dir.join("subdir").join("file2.txt"), b"This is file 2 content").await?;

    tokio::fs::create_dir_all(&dest_dir).await?;
    tokio::fs::write(dest_dir.join("leftover.txt"), b"Not in the source").await?;
    tokio::fs::write(dest_dir.join("notes.keep"), b"Protected by ignore_in_dest").await?;

    let task_file = TaskFile::parse(&format!(
        r#"
        [tasks.demo]
        updateAndDelete = true
        ignoreInDest = "*.keep"

        [[tasks.demo.files]]
        cwd = {:?}
        src = "**"
        dest = {:?}
        "#,
        source_dir.display().to_string(),
        dest_dir.display().to_string(),
    ))?;
    task_file.validate()?;
    let task: &TaskConfig = task_file.task("demo")?;

    // Dry run first
    let preview = SyncEngine::new(SyncOptions {
        pretend: true,
        ..task.options.clone()
    });
    let metrics = preview.run_task(task).await?;
    println!("Preview: {}", metrics.summary());

    // Real run, watching the event stream
    let (reporter, mut events) = ProgressChannel::new(LogChannel::Verbose);
    let engine = SyncEngine::new(task.options.clone()).with_reporter(reporter);
    let metrics = engine.run_task(task).await?;
    drop(engine);

    while let Some(event) = events.recv().await {
        if let ProgressEvent::Action { message, .. } = event {
            println!("  {}", message);
        }
    }

    println!("Result: {}", metrics.summary());
    println!("leftover.txt exists: {}", dest_dir.join("leftover.txt").exists());
    println!("notes.keep exists: {}", dest_dir.join("notes.keep").exists());

    Ok(())
}
