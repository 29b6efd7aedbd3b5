// tripwatch CLI
//
// Resolves partner references in saved article HTML and prints one JSON
// record per reference, followed by a run summary. Real deployments wire the
// resolver to the CMS and a database through the ArticleSource/RecordSink
// traits; this binary covers ad-hoc checks against files on disk.
//
// Usage: tripwatch <article.html> [more.html ...]

use std::future::Future;
use std::io::Read;
use std::pin::Pin;

use anyhow::{Context, Result, bail};
use tracing::info;
use tracing_subscriber::EnvFilter;

use tripwatch::{
    Article, ArticleSource, CancelFlag, LinkRecord, RecordSink, Resolver, WatchConfig, WatchResult,
    cancel_pair,
};

/// Articles loaded from local HTML files, one article per file.
struct FileSource {
    paths: Vec<String>,
}

impl ArticleSource for FileSource {
    fn fetch(&self) -> Pin<Box<dyn Future<Output = WatchResult<Vec<Article>>> + Send + '_>> {
        Box::pin(async move {
            let mut articles = Vec::with_capacity(self.paths.len());
            for (index, path) in self.paths.iter().enumerate() {
                let html_body = if path == "-" {
                    let mut buf = String::new();
                    std::io::stdin().read_to_string(&mut buf)?;
                    buf
                } else {
                    std::fs::read_to_string(path)?
                };
                articles.push(Article {
                    id: index as u64 + 1,
                    title: path.clone(),
                    html_body,
                });
            }
            Ok(articles)
        })
    }
}

/// Prints each record as one JSON line on stdout.
struct JsonLineSink;

impl RecordSink for JsonLineSink {
    fn upsert<'a>(
        &'a self,
        records: &'a [LinkRecord],
    ) -> Pin<Box<dyn Future<Output = WatchResult<()>> + Send + 'a>> {
        Box::pin(async move {
            for record in records {
                println!("{}", serde_json::to_string(record)?);
            }
            Ok(())
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let paths: Vec<String> = std::env::args().skip(1).collect();
    if paths.is_empty() {
        bail!("usage: tripwatch <article.html> [more.html ...]  (use - for stdin)");
    }

    let config = WatchConfig::from_env();
    let resolver = Resolver::new(config).context("failed to build resolver")?;

    let (handle, cancel) = cancel_pair();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, finishing current reference");
            handle.cancel();
        }
    });

    run(&resolver, FileSource { paths }, &cancel).await
}

async fn run(resolver: &Resolver, source: FileSource, cancel: &CancelFlag) -> Result<()> {
    let summary = resolver.run(&source, &JsonLineSink, cancel).await?;
    eprintln!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
