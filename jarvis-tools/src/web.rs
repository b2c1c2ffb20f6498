use crate::automation::{Automation, Invocation};
use crate::error::{Result, ToolError};
use crate::invocation::MusicPlatform;
use crate::toolbox::ToolOutcome;
use regex::Regex;
use reqwest::Url;
use std::time::Duration;
use tokio::sync::Mutex;

const OPEN_TIMEOUT: Duration = Duration::from_secs(5);
const SCRIPT_TIMEOUT: Duration = Duration::from_secs(3);
/// Opened tabs remembered for close_website; older ones are forgotten.
pub(crate) const MAX_TRACKED_TABS: usize = 50;

const WEBSITE_MAP: &[(&str, &str)] = &[
    ("youtube", "https://youtube.com"),
    ("instagram", "https://instagram.com"),
    ("facebook", "https://facebook.com"),
    ("twitter", "https://twitter.com"),
    ("x", "https://x.com"),
    ("reddit", "https://reddit.com"),
    ("github", "https://github.com"),
    ("gmail", "https://gmail.com"),
    ("google", "https://google.com"),
    ("linkedin", "https://linkedin.com"),
    ("netflix", "https://netflix.com"),
    ("spotify", "https://spotify.com"),
    ("amazon", "https://amazon.com"),
    ("whatsapp", "https://web.whatsapp.com"),
    ("chatgpt", "https://chatgpt.com"),
    ("chat gpt", "https://chatgpt.com"),
    ("chat gbt", "https://chatgpt.com"),
    ("notion", "https://notion.so"),
    ("figma", "https://figma.com"),
    ("pinterest", "https://pinterest.com"),
    ("pin", "https://pinterest.com"),
];

/// Browsers checked for close_website, as (app name, exact process name).
const BROWSERS: &[(&str, &str)] = &[
    ("Google Chrome", "Google Chrome"),
    ("Safari", "Safari"),
    ("Brave Browser", "Brave Browser"),
    ("Firefox", "firefox"),
    ("Arc", "Arc"),
];

/// Turn a site name or partial URL into something a browser can open.
pub fn normalize_url(site: &str) -> String {
    let trimmed = site.trim();
    let lower = trimmed.to_ascii_lowercase();

    if lower.starts_with("http://") || lower.starts_with("https://") {
        return trimmed.to_string();
    }
    if lower.starts_with("www.") {
        return format!("https://{lower}");
    }
    if let Some((_, url)) = WEBSITE_MAP.iter().find(|(name, _)| *name == lower) {
        return (*url).to_string();
    }
    // Short keys like "x" only match exactly.
    if let Some((_, url)) = WEBSITE_MAP
        .iter()
        .filter(|(name, _)| name.len() >= 3)
        .find(|(name, _)| lower.contains(name) || (lower.len() >= 3 && name.contains(&lower)))
    {
        return (*url).to_string();
    }
    if trimmed.contains('.') && !trimmed.contains(' ') {
        return format!("https://{trimmed}");
    }
    search_url("https://www.google.com/search", "q", trimmed)
}

fn search_url(base: &str, key: &str, query: &str) -> String {
    Url::parse_with_params(base, &[(key, query)])
        .map(|u| u.to_string())
        .unwrap_or_else(|_| base.to_string())
}

fn spotify_search_url(query: &str) -> String {
    let mut url = match Url::parse("https://open.spotify.com/search") {
        Ok(u) => u,
        Err(_) => return "https://open.spotify.com/search".to_string(),
    };
    if let Ok(mut segments) = url.path_segments_mut() {
        segments.push(query);
    }
    url.to_string()
}

/// The program that opens URLs and paths with their default handler.
pub(crate) fn opener(automation: &dyn Automation) -> &'static str {
    if automation.supports_app_control() {
        "open"
    } else {
        "xdg-open"
    }
}

pub(crate) async fn open_target(automation: &dyn Automation, target: &str) -> Result<()> {
    let out = automation
        .run(&Invocation::new(opener(automation), [target]), OPEN_TIMEOUT)
        .await?;
    if out.success {
        Ok(())
    } else {
        Err(ToolError::ExecutionFailed(format!(
            "could not open {target}: {}",
            out.stderr.trim()
        )))
    }
}

async fn remember_tab(tabs: &Mutex<Vec<String>>, url: &str) {
    let mut stack = tabs.lock().await;
    stack.push(url.to_string());
    if stack.len() > MAX_TRACKED_TABS {
        let excess = stack.len() - MAX_TRACKED_TABS;
        stack.drain(..excess);
    }
}

#[tracing::instrument(level = "info", skip(automation, tabs))]
pub(crate) async fn open_websites(
    automation: &dyn Automation,
    tabs: &Mutex<Vec<String>>,
    sites: &[String],
) -> Result<ToolOutcome> {
    let mut opened = Vec::new();
    let mut failed = Vec::new();
    for site in sites {
        let url = normalize_url(site);
        match open_target(automation, &url).await {
            Ok(()) => {
                remember_tab(tabs, &url).await;
                opened.push(url);
            }
            Err(e) => {
                tracing::warn!(%site, error = %e, "website open failed");
                failed.push(site.clone());
            }
        }
    }

    let message = match (opened.len(), failed.len()) {
        (0, _) => {
            return Err(ToolError::ExecutionFailed(
                "I could not open those websites.".to_string(),
            ));
        }
        (1, 0) => format!("Opened {}", opened[0]),
        (n, 0) => format!("Opened {n} websites"),
        (n, f) => format!("Opened {n} sites, {f} failed"),
    };
    Ok(ToolOutcome::with_data(
        message,
        serde_json::json!({ "urls": opened, "failed": failed }),
    ))
}

async fn running_browser(automation: &dyn Automation) -> Option<&'static str> {
    for &(app, process) in BROWSERS {
        let check = Invocation::new("pgrep", ["-x", process]);
        if let Ok(out) = automation.run(&check, Duration::from_secs(2)).await {
            if out.success {
                return Some(app);
            }
        }
    }
    None
}

#[tracing::instrument(level = "info", skip_all)]
pub(crate) async fn close_website(
    automation: &dyn Automation,
    tabs: &Mutex<Vec<String>>,
) -> Result<ToolOutcome> {
    let mut stack = tabs.lock().await;
    let Some(last_url) = stack.pop() else {
        return Err(ToolError::ExecutionFailed(
            "No websites have been opened by me yet.".to_string(),
        ));
    };

    let result = close_front_tab(automation).await;
    match result {
        Ok(browser) => Ok(ToolOutcome::with_data(
            format!("Closed tab in {browser}"),
            serde_json::json!({ "url": last_url, "browser": browser }),
        )),
        Err(e) => {
            stack.push(last_url);
            Err(e)
        }
    }
}

async fn close_front_tab(automation: &dyn Automation) -> Result<&'static str> {
    if !automation.supports_app_control() {
        return Err(ToolError::Unsupported("Only supported on macOS".to_string()));
    }
    let Some(browser) = running_browser(automation).await else {
        return Err(ToolError::ExecutionFailed(
            "No browser is currently running.".to_string(),
        ));
    };

    automation
        .run(&Invocation::new("open", ["-a", browser]), SCRIPT_TIMEOUT)
        .await?;
    tokio::time::sleep(Duration::from_millis(500)).await;

    let keystroke = Invocation::new(
        "osascript",
        [
            "-e",
            "tell application \"System Events\" to keystroke \"w\" using command down",
        ],
    );
    if automation.run(&keystroke, SCRIPT_TIMEOUT).await?.success {
        return Ok(browser);
    }

    // Direct app scripting needs no Accessibility permission.
    let direct = match browser {
        "Google Chrome" => Some("tell application \"Google Chrome\" to close active tab of front window"),
        "Safari" => Some("tell application \"Safari\" to close current tab of front window"),
        _ => None,
    };
    if let Some(script) = direct {
        if automation
            .run(&Invocation::new("osascript", ["-e", script]), SCRIPT_TIMEOUT)
            .await?
            .success
        {
            return Ok(browser);
        }
    }

    Err(ToolError::ExecutionFailed(
        "I could not close the tab. Please grant Terminal automation permission in System Settings, Privacy and Security, Automation.".to_string(),
    ))
}

/// First video id embedded in a YouTube results page.
pub fn extract_first_video_id(html: &str) -> Option<String> {
    Regex::new(r#""videoId":"([A-Za-z0-9_-]{11})""#)
        .ok()?
        .captures(html)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

async fn first_youtube_video(http: &reqwest::Client, query: &str) -> Option<String> {
    let search = search_url("https://www.youtube.com/results", "search_query", query);
    let html = http
        .get(&search)
        .header(reqwest::header::USER_AGENT, "Mozilla/5.0")
        .timeout(Duration::from_secs(5))
        .send()
        .await
        .ok()?
        .text()
        .await
        .ok()?;
    extract_first_video_id(&html).map(|id| format!("https://www.youtube.com/watch?v={id}&autoplay=1"))
}

pub(crate) struct MusicRequest<'a> {
    pub requested: Option<&'a str>,
    pub saved_preference: Option<&'a str>,
    pub platform: MusicPlatform,
}

impl MusicRequest<'_> {
    /// What to search for: the request, then the saved taste, then a generic fallback.
    pub fn chosen(&self) -> &str {
        self.requested
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .or_else(|| self.saved_preference.map(str::trim).filter(|s| !s.is_empty()))
            .unwrap_or("top hits")
    }

    fn used_saved_preference(&self) -> bool {
        self.requested.map(str::trim).is_none_or(str::is_empty)
            && self.saved_preference.map(str::trim).is_some_and(|s| !s.is_empty())
    }
}

#[tracing::instrument(level = "info", skip_all, fields(platform = ?req.platform))]
pub(crate) async fn play_music(
    automation: &dyn Automation,
    tabs: &Mutex<Vec<String>>,
    http: Option<&reqwest::Client>,
    req: MusicRequest<'_>,
) -> Result<ToolOutcome> {
    let chosen = req.chosen().to_string();
    let url = match req.platform {
        MusicPlatform::Spotify => spotify_search_url(&chosen),
        MusicPlatform::Youtube => {
            let target = format!("{chosen} music");
            let direct = match http {
                Some(client) => first_youtube_video(client, &target).await,
                None => None,
            };
            direct.unwrap_or_else(|| {
                search_url("https://www.youtube.com/results", "search_query", &target)
            })
        }
    };

    open_target(automation, &url)
        .await
        .map_err(|e| ToolError::ExecutionFailed(format!("Could not play music: {}", e.user_message())))?;
    remember_tab(tabs, &url).await;

    let source = if req.used_saved_preference() {
        "using your saved preference"
    } else {
        "for your request"
    };
    tracing::info!(%url, source, "music playback started");
    Ok(ToolOutcome::with_data(
        format!("Now playing {chosen}."),
        serde_json::json!({ "query": chosen, "url": url, "source": source }),
    ))
}
