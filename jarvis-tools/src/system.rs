use crate::automation::{Automation, Invocation};
use crate::invocation::InfoType;
use crate::toolbox::ToolOutcome;
use chrono::{DateTime, Local};
use std::collections::BTreeMap;
use std::time::Duration;

const PROBE_TIMEOUT: Duration = Duration::from_secs(3);
const SYSTEM_PROCESSES: &[&str] = &["universalaccessd", "loginwindow", "backgroundtaskmanagementagent"];

/// `pmset -g batt` → "80% (charging)".
pub fn parse_battery(output: &str) -> Option<String> {
    let line = output.lines().find(|l| l.contains('%'))?;
    let pct_idx = line.find('%')?;
    let digits_start = line[..pct_idx]
        .rfind(|c: char| !c.is_ascii_digit())
        .map(|i| i + 1)
        .unwrap_or(0);
    let pct = &line[digits_start..pct_idx];
    if pct.is_empty() {
        return None;
    }

    let lower = line.to_ascii_lowercase();
    let status = if lower.contains("discharging") {
        "on battery"
    } else if lower.contains("charging") {
        "charging"
    } else if lower.contains("charged") {
        "fully charged"
    } else {
        ""
    };
    Some(if status.is_empty() {
        format!("{pct}%")
    } else {
        format!("{pct}% ({status})")
    })
}

/// `df -h /` → "120Gi free of 460Gi total (74% used)".
pub fn parse_disk(output: &str) -> Option<String> {
    let row = output.lines().nth(1)?;
    let cols: Vec<&str> = row.split_whitespace().collect();
    if cols.len() < 5 {
        return None;
    }
    Some(format!(
        "{} free of {} total ({} used)",
        cols[3], cols[1], cols[4]
    ))
}

/// App names from `lsappinfo list`, whose app lines look like `12) "Safari" ASN:...`.
pub fn parse_running_apps(output: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|l| l.contains(") \"") && l.contains("ASN:"))
        .filter_map(|l| l.split('"').nth(1))
        .filter(|name| !SYSTEM_PROCESSES.contains(name))
        .map(str::to_string)
        .collect()
}

/// Wi-Fi device from `networksetup -listallhardwareports`.
pub fn parse_wifi_device(output: &str) -> Option<String> {
    output
        .split("Hardware Port:")
        .filter(|block| block.contains("Wi-Fi"))
        .flat_map(|block| block.lines())
        .find_map(|l| l.trim().strip_prefix("Device:").map(|d| d.trim().to_string()))
        .filter(|d| !d.is_empty())
}

/// Network name from `networksetup -getairportnetwork <dev>`.
pub fn parse_wifi_network(output: &str) -> String {
    let out = output.trim();
    if let Some((_, name)) = out.split_once("Current Wi-Fi Network:") {
        return name.trim().to_string();
    }
    if out.contains("not associated") {
        return "Not connected".to_string();
    }
    "Unable to detect".to_string()
}

pub fn format_time(now: &DateTime<Local>) -> String {
    now.format("%I:%M %p, %A, %B %d, %Y").to_string()
}

async fn probe(automation: &dyn Automation, program: &str, args: &[&str]) -> Option<String> {
    let inv = Invocation::new(program, args.iter().copied());
    match automation.run(&inv, PROBE_TIMEOUT).await {
        Ok(out) if out.success => Some(out.stdout),
        Ok(out) => {
            tracing::debug!(program, stderr = %out.stderr.trim(), "system probe failed");
            None
        }
        Err(e) => {
            tracing::debug!(program, error = %e, "system probe failed");
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Reading {
    Text(String),
    Apps(Vec<String>),
}

impl Reading {
    fn text(&self) -> String {
        match self {
            Reading::Text(s) => s.clone(),
            Reading::Apps(apps) if apps.is_empty() => "No apps detected".to_string(),
            Reading::Apps(apps) => apps.iter().take(20).cloned().collect::<Vec<_>>().join(", "),
        }
    }
}

fn title(key: &str) -> &'static str {
    match key {
        "battery" => "Battery",
        "disk" => "Disk",
        "time" => "Time",
        "running_apps" => "Running apps",
        _ => "Wifi",
    }
}

#[tracing::instrument(level = "info", skip(automation))]
pub(crate) async fn system_info(automation: &dyn Automation, info_type: InfoType) -> ToolOutcome {
    let wants = |t: InfoType| info_type == InfoType::All || info_type == t;
    let mut info: BTreeMap<&'static str, Reading> = BTreeMap::new();

    if wants(InfoType::Battery) {
        let v = probe(automation, "pmset", &["-g", "batt"])
            .await
            .and_then(|o| parse_battery(&o))
            .unwrap_or_else(|| "Unavailable".to_string());
        info.insert("battery", Reading::Text(v));
    }
    if wants(InfoType::Disk) {
        let v = probe(automation, "df", &["-h", "/"])
            .await
            .and_then(|o| parse_disk(&o))
            .unwrap_or_else(|| "Unavailable".to_string());
        info.insert("disk", Reading::Text(v));
    }
    if wants(InfoType::Time) {
        info.insert("time", Reading::Text(format_time(&Local::now())));
    }
    if wants(InfoType::RunningApps) {
        let v = match probe(automation, "lsappinfo", &["list"]).await {
            Some(o) => Reading::Apps(parse_running_apps(&o)),
            None => Reading::Text("Unable to get running apps".to_string()),
        };
        info.insert("running_apps", v);
    }
    if wants(InfoType::Wifi) {
        let device = probe(automation, "networksetup", &["-listallhardwareports"])
            .await
            .and_then(|o| parse_wifi_device(&o))
            .unwrap_or_else(|| "en0".to_string());
        let v = probe(automation, "networksetup", &["-getairportnetwork", device.as_str()])
            .await
            .map(|o| parse_wifi_network(&o))
            .unwrap_or_else(|| "Unable to detect".to_string());
        info.insert("wifi", Reading::Text(v));
    }

    let message = match info_type {
        InfoType::Battery => format!("Your battery is at {}.", info["battery"].text()),
        InfoType::Time => format!("The current time is {}.", info["time"].text()),
        InfoType::Disk => format!("Disk status: {}.", info["disk"].text()),
        InfoType::RunningApps => format!("Running apps: {}.", info["running_apps"].text()),
        InfoType::Wifi => format!("Wi-Fi: {}.", info["wifi"].text()),
        InfoType::All => info
            .iter()
            .map(|(key, reading)| match reading {
                Reading::Apps(apps) => format!("Running apps: {} apps active", apps.len()),
                other => format!("{}: {}", title(key), other.text()),
            })
            .collect::<Vec<_>>()
            .join(". "),
    };

    let data: serde_json::Map<String, serde_json::Value> = info
        .iter()
        .map(|(k, v)| {
            let value = match v {
                Reading::Apps(apps) => serde_json::json!(apps),
                Reading::Text(s) => serde_json::json!(s),
            };
            ((*k).to_string(), value)
        })
        .collect();
    ToolOutcome::with_data(message, serde_json::Value::Object(data))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::automation::{CommandOutput, RecordingAutomation};

    #[test]
    fn battery_parsing_reads_percent_and_state() {
        let out = "Now drawing from 'AC Power'\n -InternalBattery-0 (id=123)\t87%; charging; 0:41 remaining present: true\n";
        assert_eq!(parse_battery(out).as_deref(), Some("87% (charging)"));
        let out = " -InternalBattery-0 (id=1)\t42%; discharging; 3:10 remaining";
        assert_eq!(parse_battery(out).as_deref(), Some("42% (on battery)"));
        let out = " -InternalBattery-0 (id=1)\t100%; charged; 0:00 remaining";
        assert_eq!(parse_battery(out).as_deref(), Some("100% (fully charged)"));
        assert_eq!(parse_battery("no battery"), None);
    }

    #[test]
    fn disk_parsing_reads_second_row() {
        let out = "Filesystem     Size   Used  Avail Capacity  iused ifree %iused  Mounted on\n/dev/disk3s1s1  460Gi  340Gi  120Gi    74%  400k  1.2G    0%   /\n";
        assert_eq!(
            parse_disk(out).as_deref(),
            Some("120Gi free of 460Gi total (74% used)")
        );
        assert_eq!(parse_disk("header only"), None);
    }

    #[test]
    fn running_apps_skip_system_processes() {
        let out = r#"
 1) "loginwindow" ASN:0x0-0x1001:
 2) "Safari" ASN:0x0-0x2002:
 3) "Terminal" ASN:0x0-0x3003:
    bundleID="com.apple.Terminal"
"#;
        assert_eq!(parse_running_apps(out), vec!["Safari", "Terminal"]);
    }

    #[test]
    fn wifi_parsing() {
        let ports = "Hardware Port: Ethernet\nDevice: en1\n\nHardware Port: Wi-Fi\nDevice: en0\nEthernet Address: aa\n";
        assert_eq!(parse_wifi_device(ports).as_deref(), Some("en0"));
        assert_eq!(parse_wifi_network("Current Wi-Fi Network: HomeNet\n"), "HomeNet");
        assert_eq!(
            parse_wifi_network("You are not associated with an AirPort network."),
            "Not connected"
        );
    }

    #[tokio::test]
    async fn battery_request_is_phrased_naturally() {
        let auto = RecordingAutomation::new();
        auto.respond(
            "pmset",
            CommandOutput::ok(" -InternalBattery-0 (id=1)\t64%; discharging;"),
        );
        let out = system_info(&auto, InfoType::Battery).await;
        assert_eq!(out.message, "Your battery is at 64% (on battery).");
        assert_eq!(out.data["battery"], "64% (on battery)");
    }

    #[tokio::test]
    async fn all_collects_every_reading() {
        let auto = RecordingAutomation::new();
        auto.respond("lsappinfo", CommandOutput::ok(" 1) \"Notes\" ASN:0x1:\n"));
        let out = system_info(&auto, InfoType::All).await;
        assert!(out.message.contains("Running apps: 1 apps active"));
        assert!(out.message.contains("Battery: Unavailable"));
        assert_eq!(out.data.as_object().unwrap().len(), 5);
    }
}
