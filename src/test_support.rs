use axum::Router;
use image::{Rgb, RgbImage};
use std::net::SocketAddr;
use tokio::net::TcpListener;

use crate::codec::{FrameCodec, JpegCodec};

/// Serves `router` on an ephemeral local port for the lifetime of the test runtime.
pub async fn spawn_server(router: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

/// Address that refuses connections.
pub async fn closed_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

pub fn multipart_body(boundary: &str, parts: &[&[u8]], close: bool) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Type: image/jpeg\r\nContent-Length: {}\r\n\r\n",
                boundary,
                part.len()
            )
            .as_bytes(),
        );
        body.extend_from_slice(part);
        body.extend_from_slice(b"\r\n");
    }
    if close {
        body.extend_from_slice(format!("--{}--\r\n", boundary).as_bytes());
    }
    body
}

pub fn gray_jpeg(width: u32, height: u32) -> Vec<u8> {
    JpegCodec::new(95)
        .encode(&RgbImage::from_pixel(width, height, Rgb([128, 128, 128])))
        .unwrap()
}
