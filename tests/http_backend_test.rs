use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use image::{Rgba, RgbaImage};
use parking_lot::Mutex;
use reqwest::StatusCode;
use segment_viewer::mocks::encode_png;
use segment_viewer::upload::{MaskDescriptor, SegmentResponse};
use segment_viewer::{
    HttpBackend, InferenceEndpoint, ResourceFetcher, UploadController, UploadRequest, Viewer,
    ViewerError,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

type TestResult = Result<(), Box<dyn Error>>;

struct Route {
    method: &'static str,
    path: &'static str,
    status: u16,
    body: Vec<u8>,
}

impl Route {
    fn new(method: &'static str, path: &'static str, status: u16, body: Vec<u8>) -> Self {
        Self {
            method,
            path,
            status,
            body,
        }
    }
}

#[derive(Debug, Clone)]
struct RecordedRequest {
    method: String,
    path: String,
    content_type: Option<String>,
    body: Vec<u8>,
}

impl RecordedRequest {
    fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

type Recorded = Arc<Mutex<Vec<RecordedRequest>>>;

/// Minimal HTTP/1.1 server answering each connection once, then closing it.
async fn serve(routes: Vec<Route>) -> Result<(String, Recorded), Box<dyn Error>> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let base = format!("http://{}", listener.local_addr()?);
    let recorded = Recorded::default();
    let log = recorded.clone();
    tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            let Some(request) = read_request(&mut stream).await else {
                continue;
            };
            let route = routes
                .iter()
                .find(|r| r.method == request.method && r.path == request.path);
            let (status, body) = match route {
                Some(route) => (route.status, route.body.clone()),
                None => (404, Vec::new()),
            };
            log.lock().push(request);
            let head = format!(
                "HTTP/1.1 {} {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                status,
                reason(status),
                body.len()
            );
            let _ = stream.write_all(head.as_bytes()).await;
            let _ = stream.write_all(&body).await;
            let _ = stream.shutdown().await;
        }
    });
    Ok((base, recorded))
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        400 => "Bad Request",
        404 => "Not Found",
        _ => "Internal Server Error",
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

async fn read_request(stream: &mut TcpStream) -> Option<RecordedRequest> {
    let mut data = Vec::new();
    let mut chunk = [0u8; 4096];
    let header_end = loop {
        if let Some(pos) = find(&data, b"\r\n\r\n") {
            break pos + 4;
        }
        let n = stream.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        data.extend_from_slice(&chunk[..n]);
    };

    let head = String::from_utf8_lossy(&data[..header_end]).into_owned();
    let mut lines = head.lines();
    let mut request_line = lines.next()?.split_whitespace();
    let method = request_line.next()?.to_string();
    let path = request_line.next()?.to_string();
    let mut content_length = None;
    let mut content_type = None;
    let mut chunked = false;
    for line in lines {
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();
        match name.to_ascii_lowercase().as_str() {
            "content-length" => content_length = value.parse::<usize>().ok(),
            "content-type" => content_type = Some(value.to_string()),
            "transfer-encoding" => chunked = value.eq_ignore_ascii_case("chunked"),
            _ => {}
        }
    }

    let mut body = data.split_off(header_end);
    let complete = |body: &[u8]| match content_length {
        Some(len) => body.len() >= len,
        None if chunked => body.ends_with(b"0\r\n\r\n"),
        None => true,
    };
    while !complete(&body) {
        let n = stream.read(&mut chunk).await.ok()?;
        if n == 0 {
            break;
        }
        body.extend_from_slice(&chunk[..n]);
    }
    if chunked {
        body = decode_chunked(&body);
    }

    Some(RecordedRequest {
        method,
        path,
        content_type,
        body,
    })
}

fn decode_chunked(mut data: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    while let Some(line_end) = find(data, b"\r\n") {
        let size_field = String::from_utf8_lossy(&data[..line_end]);
        let size_hex = size_field.split(';').next().unwrap_or("").trim();
        let Ok(size) = usize::from_str_radix(size_hex, 16) else {
            break;
        };
        let start = line_end + 2;
        if size == 0 || data.len() < start + size {
            break;
        }
        out.extend_from_slice(&data[start..start + size]);
        data = &data[(start + size + 2).min(data.len())..];
    }
    out
}

/// Value of a text field in a multipart body.
fn field_value(body: &str, name: &str) -> Option<String> {
    let start = body.find(&format!("name=\"{}\"", name))?;
    let rest = &body[start..];
    let value_start = rest.find("\r\n\r\n")? + 4;
    let value = &rest[value_start..];
    let value_end = value.find("\r\n--")?;
    Some(value[..value_end].to_string())
}

/// Direct connections only, so proxy settings in the environment cannot
/// intercept the local server.
fn backend(base: &str) -> Result<HttpBackend, Box<dyn Error>> {
    let client = reqwest::Client::builder()
        .no_proxy()
        .timeout(Duration::from_secs(10))
        .build()?;
    Ok(HttpBackend::with_client(base, client)?)
}

fn success_response() -> SegmentResponse {
    SegmentResponse {
        image_url: Some("/uploads/u_photo.png".to_string()),
        stdout: Some("Running segmentation inference...\n".to_string()),
        stderr: Some(String::new()),
        masks: vec![MaskDescriptor {
            name: "mask_0.png".to_string(),
            url: "/masks/u/mask_0.png".to_string(),
        }],
        ..SegmentResponse::default()
    }
}

#[tokio::test]
async fn test_segment_posts_multipart_form() -> TestResult {
    let expected = success_response();
    let (base, recorded) = serve(vec![Route::new(
        "POST",
        "/segment",
        200,
        serde_json::to_vec(&expected)?,
    )])
    .await?;

    let request =
        UploadRequest::new("photo.png", b"PNGDATA".to_vec(), Some("fastsam.pt".into()))?;
    let response = backend(&base)?.segment(&request).await?;
    assert_eq!(response, expected);

    let requests = recorded.lock().clone();
    assert_eq!(requests.len(), 1);
    let upload = &requests[0];
    assert_eq!(upload.method, "POST");
    assert_eq!(upload.path, "/segment");
    assert!(upload
        .content_type
        .as_deref()
        .is_some_and(|ct| ct.starts_with("multipart/form-data")));

    let body = upload.body_text();
    assert!(body.contains("name=\"image\"; filename=\"photo.png\""));
    assert_eq!(field_value(&body, "image").as_deref(), Some("PNGDATA"));
    assert_eq!(field_value(&body, "model_path").as_deref(), Some("fastsam.pt"));
    Ok(())
}

#[tokio::test]
async fn test_unset_model_path_sent_empty() -> TestResult {
    let (base, recorded) = serve(vec![Route::new(
        "POST",
        "/segment",
        200,
        serde_json::to_vec(&success_response())?,
    )])
    .await?;

    let request = UploadRequest::new("photo.jpg", vec![0xff, 0xd8], None)?;
    backend(&base)?.segment(&request).await?;

    let body = recorded.lock()[0].body_text();
    assert!(body.contains("filename=\"photo.jpg\""));
    assert_eq!(field_value(&body, "model_path").as_deref(), Some(""));
    Ok(())
}

#[tokio::test]
async fn test_error_status_body_is_reported() -> TestResult {
    let failure = SegmentResponse {
        error: Some("file type not allowed".to_string()),
        ..SegmentResponse::default()
    };
    let (base, recorded) = serve(vec![Route::new(
        "POST",
        "/segment",
        400,
        serde_json::to_vec(&failure)?,
    )])
    .await?;

    let controller = UploadController::new(backend(&base)?);
    let mut viewer = Viewer::with_seed(5);
    let request = UploadRequest::new("photo.png", vec![1, 2, 3], None)?;

    match controller.submit(&mut viewer, &request).await {
        Err(ViewerError::Inference { message }) => assert_eq!(message, "file type not allowed"),
        other => panic!("unexpected result: {:?}", other),
    }
    assert_eq!(
        viewer.log().last(),
        Some("Error: Inference error: file type not allowed")
    );
    assert!(viewer.base().is_none());
    assert!(viewer.masks().is_empty());
    // nothing is fetched after an error reply
    assert_eq!(recorded.lock().len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_non_json_reply_is_invalid_response() -> TestResult {
    let (base, _) = serve(vec![Route::new(
        "POST",
        "/segment",
        500,
        b"<html>Internal Server Error</html>".to_vec(),
    )])
    .await?;

    let request = UploadRequest::new("photo.png", vec![1], None)?;
    let result = backend(&base)?.segment(&request).await;
    assert!(matches!(result, Err(ViewerError::InvalidResponse { .. })));
    Ok(())
}

#[tokio::test]
async fn test_fetch_resources() -> TestResult {
    let (base, recorded) = serve(vec![Route::new(
        "GET",
        "/uploads/u_photo.png",
        200,
        b"raw bytes".to_vec(),
    )])
    .await?;
    let backend = backend(&base)?;

    assert_eq!(backend.fetch("/uploads/u_photo.png").await?, b"raw bytes");

    match backend.fetch("/masks/u/missing.png").await {
        Err(ViewerError::Network { source, .. }) => {
            assert_eq!(source.status(), Some(StatusCode::NOT_FOUND))
        }
        other => panic!("unexpected result: {:?}", other),
    }

    let paths: Vec<String> = recorded.lock().iter().map(|r| r.path.clone()).collect();
    assert_eq!(paths, ["/uploads/u_photo.png", "/masks/u/missing.png"]);
    Ok(())
}

#[tokio::test]
async fn test_upload_and_load_over_http() -> TestResult {
    let photo = RgbaImage::from_pixel(16, 16, Rgba([40, 80, 120, 255]));
    let mask = RgbaImage::from_fn(16, 16, |x, y| {
        if x < 4 && y < 4 {
            Rgba([255, 255, 255, 255])
        } else {
            Rgba([0, 0, 0, 255])
        }
    });
    let (base, recorded) = serve(vec![
        Route::new(
            "POST",
            "/segment",
            200,
            serde_json::to_vec(&success_response())?,
        ),
        Route::new("GET", "/uploads/u_photo.png", 200, encode_png(&photo)?),
        Route::new("GET", "/masks/u/mask_0.png", 200, encode_png(&mask)?),
    ])
    .await?;

    let controller = UploadController::new(backend(&base)?);
    let mut viewer = Viewer::with_seed(5);
    let request = UploadRequest::new("photo.png", encode_png(&photo)?, None)?;

    assert_eq!(controller.submit(&mut viewer, &request).await?, 1);
    assert_eq!(viewer.masks()[0].name, "mask_0.png");
    assert_eq!(viewer.base().map(|b| b.get_pixel(1, 1)[3]), Some(0));
    assert_eq!(viewer.log().last(), Some("Loaded 1 mask(s)"));

    let paths: Vec<String> = recorded.lock().iter().map(|r| r.path.clone()).collect();
    assert_eq!(
        paths,
        ["/segment", "/uploads/u_photo.png", "/masks/u/mask_0.png"]
    );
    Ok(())
}
