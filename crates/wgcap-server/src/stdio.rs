//! Request framing over stdin/stdout.
//!
//! Each request is one JSON object terminated by a blank line. Responses are
//! pretty-printed and terminated the same way; successes go to `out`, errors
//! to `err`.

use std::io;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info};
use wgcap_capture::CaptureHost;

use crate::app::AppContext;
use crate::command::Response;

/// Read one blank-line-terminated request. `None` at end of input.
///
/// A final request that hits EOF without its blank line is still returned.
pub async fn read_request<R: AsyncBufRead + Unpin>(input: &mut R) -> io::Result<Option<Vec<u8>>> {
    let mut request = Vec::new();
    loop {
        let n = input.read_until(b'\n', &mut request).await?;
        if n == 0 {
            break;
        }
        if request.ends_with(b"\n\n") || request.ends_with(b"\n\r\n") {
            break;
        }
        // Blank lines between requests carry nothing.
        if request.iter().all(u8::is_ascii_whitespace) {
            request.clear();
        }
    }

    if request.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    Ok(Some(request))
}

/// Write `response` with two-space indentation followed by a blank line.
pub async fn write_response<W: AsyncWrite + Unpin>(out: &mut W, response: &Response) -> io::Result<()> {
    let mut text = serde_json::to_vec_pretty(response).map_err(io::Error::other)?;
    text.extend_from_slice(b"\n\n");
    out.write_all(&text).await?;
    out.flush().await
}

/// Serve requests from `input` until it ends.
pub async fn serve<H, R, W, E>(ctx: &mut AppContext<H>, mut input: R, out: &mut W, err: &mut E) -> io::Result<()>
where
    H: CaptureHost,
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
    E: AsyncWrite + Unpin,
{
    let mut served = 0u64;
    while let Some(request) = read_request(&mut input).await? {
        let response = ctx.handle(&request).await;
        if response.is_error() {
            write_response(err, &response).await?;
        } else {
            write_response(out, &response).await?;
        }
        served += 1;
        debug!("Request #{served} answered");
    }
    info!("Input closed after {served} request(s)");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wgcap_capture::testing::FakeHost;
    use wgcap_core::{FrameSize, ServerConfig};

    #[tokio::test]
    async fn splits_on_blank_lines() {
        let mut input: &[u8] = b"{\"cmd\":\n\"enum_windows\"}\n\n{\"cmd\":\"capture_end\"}\r\n\r\n";

        let first = read_request(&mut input).await.unwrap().unwrap();
        assert_eq!(first, b"{\"cmd\":\n\"enum_windows\"}\n\n");
        let second = read_request(&mut input).await.unwrap().unwrap();
        assert_eq!(second, b"{\"cmd\":\"capture_end\"}\r\n\r\n");
        assert!(read_request(&mut input).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn skips_leading_blank_lines_and_keeps_unterminated_tail() {
        let mut input: &[u8] = b"\n\r\n{\"cmd\":\"capture_end\"}";
        let request = read_request(&mut input).await.unwrap().unwrap();
        assert_eq!(request, b"{\"cmd\":\"capture_end\"}");
        assert!(read_request(&mut input).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn response_is_pretty_printed_with_blank_line() {
        let mut out = Vec::new();
        write_response(&mut out, &Response::ok(json!("OK"))).await.unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "{\n  \"result\": \"OK\"\n}\n\n");
    }

    #[tokio::test]
    async fn routes_successes_and_errors_to_separate_streams() {
        let host = FakeHost::new().with_window(77, "Calculator", FrameSize::new(2, 2));
        let mut ctx = AppContext::new(host.clone(), ServerConfig::default());
        let input: &[u8] = b"{\"cmd\":\"enum_windows\"}\n\n\
                             {\"cmd\":\"bogus\"}\n\n\
                             {\"cmd\":\"capture_start\",\"hwnd\":\"77\"}\n\n\
                             {\"cmd\":\"capture_end\"}\n\n";
        let (mut out, mut err) = (Vec::new(), Vec::new());

        serve(&mut ctx, input, &mut out, &mut err).await.unwrap();

        let out = String::from_utf8(out).unwrap();
        let responses: Vec<serde_json::Value> = out
            .split("\n\n")
            .filter(|chunk| !chunk.is_empty())
            .map(|chunk| serde_json::from_str(chunk).unwrap())
            .collect();
        assert_eq!(responses.len(), 3);
        assert_eq!(responses[0]["result"][0]["hwnd"], "77");
        assert_eq!(responses[0]["result"][0]["title"], "Calculator");
        assert_eq!(responses[1], json!({"result": "OK"}));
        assert_eq!(responses[2], json!({"result": "OK"}));

        let err: serde_json::Value = serde_json::from_str(String::from_utf8(err).unwrap().trim_end()).unwrap();
        assert_eq!(err["error"]["message"], "Undefined command: bogus");

        assert_eq!(host.stats().live_sessions(), 0);
    }
}
