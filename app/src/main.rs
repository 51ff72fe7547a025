//! Terminal front end for the blog-post viewer.
//!
//! Maps line commands onto view events and re-renders the `ViewState` after
//! each one. All data concerns (caching, retries, invalidation) live in
//! `blog_core`; this binary owns only the real transport, CLI parsing, and
//! logging setup.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use blog_core::{
    Api, ApiError, HttpMethod, HttpRequest, HttpResponse, PostForm, Root, Transport, ViewState,
};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::Level;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "blogview", about = "Paginated blog-post viewer over a REST API")]
struct Args {
    /// Base URL of the blog API.
    #[arg(long, default_value = "http://localhost:3000")]
    base_url: String,

    /// Increase log verbosity (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

/// Execute built requests with reqwest. Non-2xx responses are returned as
/// data; status interpretation belongs to the core client.
struct ReqwestTransport {
    client: reqwest::Client,
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
        let mut builder = match request.method {
            HttpMethod::Get => self.client.get(&request.url),
            HttpMethod::Post => self.client.post(&request.url),
        };
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }
        let response = builder
            .send()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;
        Ok(HttpResponse { status, body })
    }
}

fn render(state: &ViewState) {
    if state.loading {
        println!("Loading...");
        return;
    }
    if let Some(error) = &state.error {
        println!("{error}");
    }
    if state.post_error {
        println!("Unable to Post ('r' to reset)");
    }
    if state.posting {
        println!("Posting...");
    }
    println!("tags: {}", state.tags.join(", "));
    for post in &state.posts {
        let tags: Vec<String> = post.tags.iter().map(|t| format!("[{t}]")).collect();
        println!("  {} {}", post.title, tags.join(" "));
    }
    println!(
        "page {}{} | prev: {} | next: {}",
        state.page,
        if state.is_placeholder { " (loading)" } else { "" },
        if state.prev_disabled { "-" } else { "p" },
        if state.next_disabled { "-" } else { "n" },
    );
}

/// `post <title words> [#tag ...]` — words prefixed with `#` are the
/// checked tags, everything else joins into the title.
fn parse_submission(rest: &str) -> PostForm {
    let mut title_words = Vec::new();
    let mut tags = Vec::new();
    for word in rest.split_whitespace() {
        match word.strip_prefix('#') {
            Some(tag) => tags.push(tag.to_string()),
            None => title_words.push(word),
        }
    }
    PostForm {
        title: title_words.join(" "),
        tags,
    }
}

fn init_logging(verbose: u8) -> Result<()> {
    let filter = match verbose {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive(format!("blog_core={filter}").parse()?),
        )
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose)?;

    let transport = Arc::new(ReqwestTransport {
        client: reqwest::Client::new(),
    });
    let api = Api::new(&args.base_url, transport);
    let mut root = Root::new(api);

    if let Some(list) = root.list_mut() {
        list.ensure_loaded().await;
        render(&list.view_state().await);
    }
    println!("commands: n(ext), p(rev), post <title> [#tag ...], r(eset), t(oggle), q(uit)");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        match line.split_whitespace().next().unwrap_or("") {
            "q" => break,
            "t" => root.toggle(),
            "n" => {
                if let Some(list) = root.list_mut() {
                    list.next_page().await;
                }
            }
            "p" => {
                if let Some(list) = root.list_mut() {
                    list.previous_page();
                }
            }
            "r" => {
                if let Some(list) = root.list_mut() {
                    list.reset_mutation();
                }
            }
            "post" => {
                if let Some(list) = root.list_mut() {
                    let rest = line.strip_prefix("post").unwrap_or_default();
                    list.submit(parse_submission(rest)).await;
                }
            }
            "" => {}
            other => println!("unknown command: {other}"),
        }

        match root.list_mut() {
            Some(list) => {
                list.ensure_loaded().await;
                render(&list.view_state().await);
            }
            None => println!("(view hidden, 't' to show)"),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn submission_splits_tags_from_title() {
        let form = parse_submission(" Hello world #tech #rust ");
        assert_eq!(form.title, "Hello world");
        assert_eq!(form.tags, vec!["tech", "rust"]);
    }

    #[test]
    fn submission_without_tags_keeps_empty_selection() {
        let form = parse_submission("Just a title");
        assert_eq!(form.title, "Just a title");
        assert!(form.tags.is_empty());
    }

    #[test]
    fn empty_submission_yields_empty_title() {
        let form = parse_submission("");
        assert!(form.title.is_empty());
    }
}
