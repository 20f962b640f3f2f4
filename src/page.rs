//! Page-level primitives: locating elements, bounded waiting, keyboard
//! input, and screenshot capture.
//!
//! The target application is a SPA that renders its controls after load,
//! so every lookup polls with exponential backoff instead of assuming the
//! element already exists. Anything that embeds a caller-supplied string
//! into injected JavaScript goes through JSON encoding first.

use std::path::Path;
use std::time::{Duration, Instant};

use chromiumoxide::element::Element;
use chromiumoxide::page::{Page, ScreenshotParams};
use chromiumoxide_cdp::cdp::browser_protocol::input::{
    DispatchKeyEventParams, DispatchKeyEventType,
};
use chromiumoxide_cdp::cdp::browser_protocol::page::CaptureScreenshotFormat;
use tracing::debug;

use crate::{Error, Result};

/// Poll interval start and cap for all bounded waits.
const POLL_START: Duration = Duration::from_millis(100);
const POLL_MAX: Duration = Duration::from_secs(1);

/// Embed a string into injected JS as a quoted literal.
fn js_string(s: &str) -> String {
    // Serializing a &str to JSON cannot fail.
    serde_json::to_string(s).unwrap_or_else(|_| "\"\"".to_string())
}

fn visibility_js(selector: &str) -> String {
    format!(
        r#"(() => {{
            const el = document.querySelector({sel});
            if (!el) return false;
            const style = window.getComputedStyle(el);
            if (style.display === 'none' || style.visibility === 'hidden') return false;
            const rect = el.getBoundingClientRect();
            return rect.width > 0 && rect.height > 0;
        }})()"#,
        sel = js_string(selector)
    )
}

fn enabled_js(selector: &str) -> String {
    format!(
        r#"(() => {{
            const el = document.querySelector({sel});
            if (!el) return false;
            if (el.disabled) return false;
            return el.getAttribute('aria-disabled') !== 'true';
        }})()"#,
        sel = js_string(selector)
    )
}

fn text_present_js(text: &str) -> String {
    format!(
        r#"(() => {{
            if (!document.body) return false;
            return (document.body.innerText || '').includes({text});
        }})()"#,
        text = js_string(text)
    )
}

/// Find a visible button by accessible name and return a CSS selector for
/// it. Matches `aria-label` first, then trimmed text content, over
/// `button` and `[role="button"]` elements.
fn button_lookup_js(name: &str) -> String {
    format!(
        r#"(() => {{
            const name = {name};
            const matches = (el) => {{
                const label = el.getAttribute('aria-label');
                if (label && label.trim() === name) return true;
                return (el.textContent || '').trim() === name;
            }};
            for (const el of document.querySelectorAll('button, [role="button"]')) {{
                if (!matches(el)) continue;
                const style = window.getComputedStyle(el);
                if (style.display === 'none' || style.visibility === 'hidden') continue;
                const rect = el.getBoundingClientRect();
                if (rect.width === 0 || rect.height === 0) continue;
                if (el.id) return '#' + el.id;
                const path = [];
                let node = el;
                while (node && node !== document.body) {{
                    let selector = node.tagName.toLowerCase();
                    if (node.id) {{
                        path.unshift('#' + node.id);
                        break;
                    }}
                    const siblings = Array.from(node.parentNode?.children || []);
                    const index = siblings.indexOf(node) + 1;
                    if (siblings.length > 1) selector += ':nth-child(' + index + ')';
                    path.unshift(selector);
                    node = node.parentNode;
                }}
                return path.join(' > ');
            }}
            return null;
        }})()"#,
        name = js_string(name)
    )
}

fn timeout_error(what: impl Into<String>, timeout: Duration) -> Error {
    Error::Timeout {
        what: what.into(),
        timeout_ms: timeout.as_millis() as u64,
    }
}

/// Navigate and wait for the page lifecycle to complete.
pub async fn navigate(page: &Page, url: &str, timeout: Duration) -> Result<()> {
    debug!("goto: {}", url);
    tokio::time::timeout(timeout, page.goto(url))
        .await
        .map_err(|_| timeout_error(format!("navigation to '{url}'"), timeout))??;

    page.wait_for_navigation().await?;
    Ok(())
}

/// Wait for an element to appear in the DOM, polling with exponential
/// backoff (100ms start, 1s cap) until found or the timeout elapses.
pub async fn wait_for_element(page: &Page, selector: &str, timeout: Duration) -> Result<Element> {
    let start = Instant::now();
    let mut poll_interval = POLL_START;

    loop {
        if let Ok(element) = page.find_element(selector).await {
            return Ok(element);
        }

        if start.elapsed() >= timeout {
            return Err(timeout_error(format!("element '{selector}'"), timeout));
        }

        tokio::time::sleep(poll_interval).await;
        poll_interval = (poll_interval * 2).min(POLL_MAX);
    }
}

/// Poll an injected boolean predicate until it holds.
async fn wait_for_js(page: &Page, js: &str, what: &str, timeout: Duration) -> Result<()> {
    let start = Instant::now();
    let mut poll_interval = POLL_START;

    loop {
        // Evaluation can fail transiently while the SPA re-renders; treat
        // that the same as "not yet".
        let holds = match page.evaluate(js).await {
            Ok(result) => result.into_value().unwrap_or(false),
            Err(_) => false,
        };
        if holds {
            return Ok(());
        }

        if start.elapsed() >= timeout {
            return Err(timeout_error(what, timeout));
        }

        tokio::time::sleep(poll_interval).await;
        poll_interval = (poll_interval * 2).min(POLL_MAX);
    }
}

/// Wait until the element exists, is not display:none / visibility:hidden,
/// and has a non-empty layout box.
pub async fn wait_for_visible(page: &Page, selector: &str, timeout: Duration) -> Result<()> {
    debug!("wait_for_visible: {}", selector);
    wait_for_js(
        page,
        &visibility_js(selector),
        &format!("visible element '{selector}'"),
        timeout,
    )
    .await
}

/// Wait until the element is present and neither `disabled` nor
/// `aria-disabled`.
pub async fn wait_for_enabled(page: &Page, selector: &str, timeout: Duration) -> Result<()> {
    debug!("wait_for_enabled: {}", selector);
    wait_for_js(
        page,
        &enabled_js(selector),
        &format!("enabled element '{selector}'"),
        timeout,
    )
    .await
}

/// Wait until the page body text contains `text`.
pub async fn wait_for_text(page: &Page, text: &str, timeout: Duration) -> Result<()> {
    debug!("wait_for_text: '{}'", text);
    wait_for_js(
        page,
        &text_present_js(text),
        &format!("text '{text}'"),
        timeout,
    )
    .await
}

/// Wait for a visible button with the given accessible name and return a
/// CSS selector for it.
pub async fn wait_for_button(page: &Page, name: &str, timeout: Duration) -> Result<String> {
    debug!("wait_for_button: '{}'", name);
    let js = button_lookup_js(name);
    let start = Instant::now();
    let mut poll_interval = POLL_START;

    loop {
        let found: Option<String> = match page.evaluate(js.as_str()).await {
            Ok(result) => result.into_value().unwrap_or(None),
            Err(_) => None,
        };
        if let Some(selector) = found {
            debug!("button '{}' resolved to selector '{}'", name, selector);
            return Ok(selector);
        }

        if start.elapsed() >= timeout {
            return Err(timeout_error(format!("button '{name}'"), timeout));
        }

        tokio::time::sleep(poll_interval).await;
        poll_interval = (poll_interval * 2).min(POLL_MAX);
    }
}

/// Click the element matching `selector`.
///
/// Scrolls into view and clicks via the resolved point rather than
/// `Element::click`, which can hang on IntersectionObserver.
pub async fn click(page: &Page, selector: &str, timeout: Duration) -> Result<()> {
    let element = wait_for_element(page, selector, timeout).await?;

    element
        .scroll_into_view()
        .await
        .map_err(|e| Error::StepFailed(format!("scroll into view failed for '{selector}': {e}")))?;

    let point = element.clickable_point().await.map_err(|e| {
        Error::StepFailed(format!(
            "no clickable point for '{selector}' (element may not be visible): {e}"
        ))
    })?;

    page.click(point)
        .await
        .map_err(|e| Error::StepFailed(format!("click failed for '{selector}': {e}")))?;

    Ok(())
}

/// CDP key descriptor: DOM `code` value, `text` payload for keys that
/// produce characters, and the legacy virtual key code.
fn key_descriptor(key: &str) -> (String, Option<String>, Option<i64>) {
    match key {
        "Enter" => ("Enter".into(), Some("\r".into()), Some(13)),
        "Tab" => ("Tab".into(), Some("\t".into()), Some(9)),
        "Escape" => ("Escape".into(), None, Some(27)),
        "Space" => ("Space".into(), Some(" ".into()), Some(32)),
        k => {
            let mut chars = k.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) if c.is_ascii_alphabetic() => (
                    format!("Key{}", c.to_ascii_uppercase()),
                    Some(k.into()),
                    Some(c.to_ascii_uppercase() as i64),
                ),
                (Some(c), None) if c.is_ascii_digit() => {
                    (format!("Digit{c}"), Some(k.into()), Some(c as i64))
                }
                (Some(_), None) => (k.into(), Some(k.into()), None),
                _ => (k.into(), None, None),
            }
        }
    }
}

/// Press a key on the focused page: KeyDown, Char (for keys that produce
/// text), KeyUp.
pub async fn press_key(page: &Page, key: &str) -> Result<()> {
    debug!("press_key: {}", key);
    let (code, text, virtual_key_code) = key_descriptor(key);

    let mut down = DispatchKeyEventParams::builder()
        .r#type(DispatchKeyEventType::KeyDown)
        .key(key.to_string())
        .code(code.clone());
    if let Some(vk) = virtual_key_code {
        down = down.windows_virtual_key_code(vk).native_virtual_key_code(vk);
    }
    let down = down
        .build()
        .map_err(|e| Error::StepFailed(format!("key event build failed: {e}")))?;
    page.execute(down).await?;

    if let Some(text) = &text {
        let char_event = DispatchKeyEventParams::builder()
            .r#type(DispatchKeyEventType::Char)
            .key(key.to_string())
            .code(code.clone())
            .text(text.clone())
            .build()
            .map_err(|e| Error::StepFailed(format!("key event build failed: {e}")))?;
        page.execute(char_event).await?;
    }

    let mut up = DispatchKeyEventParams::builder()
        .r#type(DispatchKeyEventType::KeyUp)
        .key(key.to_string())
        .code(code);
    if let Some(vk) = virtual_key_code {
        up = up.windows_virtual_key_code(vk).native_virtual_key_code(vk);
    }
    let up = up
        .build()
        .map_err(|e| Error::StepFailed(format!("key event build failed: {e}")))?;
    page.execute(up).await?;

    Ok(())
}

/// Capture the viewport as PNG and write it to `path`, creating parent
/// directories as needed.
pub async fn save_screenshot(page: &Page, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }

    let params = ScreenshotParams::builder()
        .format(CaptureScreenshotFormat::Png)
        .build();

    let image_data = page.screenshot(params).await?;
    tokio::fs::write(path, image_data).await?;
    debug!("screenshot written: {}", path.display());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn js_string_quotes_and_escapes() {
        assert_eq!(js_string("video.stream"), "\"video.stream\"");
        assert_eq!(js_string("a\"b"), "\"a\\\"b\"");
    }

    #[test]
    fn visibility_js_embeds_selector_as_literal() {
        let js = visibility_js(".magic-effect img");
        assert!(js.contains("document.querySelector(\".magic-effect img\")"));
        assert!(js.contains("getBoundingClientRect"));
    }

    #[test]
    fn button_lookup_js_embeds_name_safely() {
        let js = button_lookup_js("it's \"quoted\"");
        assert!(js.contains(r#"const name = "it's \"quoted\"";"#));
    }

    #[test]
    fn key_descriptor_maps_letters() {
        let (code, text, vk) = key_descriptor("i");
        assert_eq!(code, "KeyI");
        assert_eq!(text.as_deref(), Some("i"));
        assert_eq!(vk, Some('I' as i64));
    }

    #[test]
    fn key_descriptor_maps_digits_and_named_keys() {
        let (code, text, vk) = key_descriptor("3");
        assert_eq!(code, "Digit3");
        assert_eq!(text.as_deref(), Some("3"));
        assert_eq!(vk, Some('3' as i64));

        let (code, text, vk) = key_descriptor("Enter");
        assert_eq!(code, "Enter");
        assert_eq!(text.as_deref(), Some("\r"));
        assert_eq!(vk, Some(13));

        let (code, text, _) = key_descriptor("Escape");
        assert_eq!(code, "Escape");
        assert!(text.is_none());
    }

    #[test]
    fn key_descriptor_passes_unknown_keys_through() {
        let (code, text, vk) = key_descriptor("ArrowDown");
        assert_eq!(code, "ArrowDown");
        assert!(text.is_none());
        assert!(vk.is_none());
    }
}
