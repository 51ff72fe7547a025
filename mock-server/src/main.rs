use mock_server::{default_tags, Post};
use tokio::net::TcpListener;

/// A handful of posts so the viewer has something to page through.
fn demo_posts() -> Vec<Post> {
    (1..=8)
        .map(|id| Post {
            id,
            title: format!("Demo post {id}"),
            tags: if id % 2 == 0 {
                vec!["tech".to_string()]
            } else {
                vec!["life".to_string()]
            },
        })
        .collect()
}

#[tokio::main]
async fn main() -> Result<(), std::io::Error> {
    let port = std::env::var("PORT").unwrap_or_else(|_| "3000".to_string());
    let addr = format!("127.0.0.1:{port}");
    let listener = TcpListener::bind(&addr).await?;
    println!("listening on {addr}");
    mock_server::run_with(listener, demo_posts(), default_tags()).await
}
