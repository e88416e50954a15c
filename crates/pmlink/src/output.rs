//! Output formatting: plain, JSON, compact JSON.
//!
//! Events are rendered one at a time as they arrive, so every format is
//! line-oriented except pretty JSON.

use std::io::{self, IsTerminal, Write};

use owo_colors::OwoColorize;
use serde::Serialize;

use pmlink_core::{
    AdcSample, CommandResult, ConnectivityState, DeviceEvent, ErrorLogSection, LogLevel,
    LoggingEvent,
};

use crate::cli::{ColorMode, OutputFormat};
use crate::error::CliError;

// ── Color helpers ────────────────────────────────────────────────────

/// Determine whether color output should be enabled.
pub fn should_color(mode: ColorMode) -> bool {
    match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => io::stdout().is_terminal() && std::env::var_os("NO_COLOR").is_none(),
    }
}

/// Rendering settings resolved once from the global flags.
#[derive(Debug, Clone, Copy)]
pub struct Renderer {
    pub format: OutputFormat,
    pub color: bool,
    pub quiet: bool,
}

impl Renderer {
    pub fn new(format: OutputFormat, color: ColorMode, quiet: bool) -> Self {
        Self {
            format,
            color: should_color(color),
            quiet,
        }
    }

    /// Render one bus event.
    pub fn event(&self, event: &DeviceEvent) -> Result<String, CliError> {
        match self.format {
            OutputFormat::Plain => Ok(plain_event(event, self.color)),
            OutputFormat::Json => render_json(event, false),
            OutputFormat::JsonCompact => render_json(event, true),
        }
    }

    /// Render a command reply.
    pub fn result(&self, command: &str, result: &CommandResult) -> Result<String, CliError> {
        #[derive(Serialize)]
        struct Reply<'a> {
            command: &'a str,
            #[serde(flatten)]
            result: &'a CommandResult,
        }

        match self.format {
            OutputFormat::Plain => Ok(match result {
                CommandResult::Success(text) => text.clone(),
                CommandResult::Error(text) => paint(&format!("error: {text}"), self.color, Paint::Error),
                CommandResult::Timeout => paint("timeout", self.color, Paint::Warn),
            }),
            OutputFormat::Json => render_json(&Reply { command, result }, false),
            OutputFormat::JsonCompact => render_json(&Reply { command, result }, true),
        }
    }

    /// Render any serializable value; `plain` supplies the text form.
    pub fn value<T: Serialize>(&self, data: &T, plain: impl FnOnce(&T) -> String) -> Result<String, CliError> {
        match self.format {
            OutputFormat::Plain => Ok(plain(data)),
            OutputFormat::Json => render_json(data, false),
            OutputFormat::JsonCompact => render_json(data, true),
        }
    }

    /// Print rendered output to stdout, respecting quiet mode.
    pub fn print(&self, output: &str) {
        if self.quiet || output.is_empty() {
            return;
        }
        let mut stdout = io::stdout().lock();
        let _ = writeln!(stdout, "{output}");
    }
}

// ── Plain renderers ──────────────────────────────────────────────────

#[derive(Clone, Copy)]
enum Paint {
    Error,
    Warn,
    Dim,
    Accent,
}

fn paint(text: &str, color: bool, style: Paint) -> String {
    if !color {
        return text.to_owned();
    }
    match style {
        Paint::Error => text.red().bold().to_string(),
        Paint::Warn => text.yellow().to_string(),
        Paint::Dim => text.dimmed().to_string(),
        Paint::Accent => text.cyan().to_string(),
    }
}

/// Device counter as `HH:MM:SS.mmm`.
pub fn format_timestamp(millis: u64) -> String {
    let hours = millis / 3_600_000;
    let minutes = millis / 60_000 % 60;
    let seconds = millis / 1_000 % 60;
    let ms = millis % 1_000;
    format!("{hours:02}:{minutes:02}:{seconds:02}.{ms:03}")
}

pub fn plain_event(event: &DeviceEvent, color: bool) -> String {
    match event {
        DeviceEvent::Log { event, grouped } => plain_log(event, *grouped, color),
        DeviceEvent::AdcSample(sample) => plain_adc(sample, color),
        DeviceEvent::Irq(irq) => format!(
            "{} {} {}",
            paint("irq", color, Paint::Accent),
            irq.register,
            irq.event
        ),
        DeviceEvent::Connectivity(state) => {
            let style = match state {
                ConnectivityState::Disconnected => Paint::Error,
                ConnectivityState::Connected => Paint::Accent,
                _ => Paint::Warn,
            };
            format!("{} {}", paint("connectivity", color, Paint::Accent), paint(&state.to_string(), color, style))
        }
        DeviceEvent::UsbPower(power) => {
            let limit = power
                .max_current_ma()
                .map_or_else(String::new, |ma| format!(" ({ma} mA)"));
            format!("{} {power}{limit}", paint("usb-c", color, Paint::Accent))
        }
        DeviceEvent::UsbPowered(present) => format!(
            "{} {}",
            paint("vbus", color, Paint::Accent),
            if *present { "present" } else { "removed" }
        ),
        DeviceEvent::ErrorLogs(section) => plain_section(section, color),
    }
}

fn plain_log(event: &LoggingEvent, grouped: bool, color: bool) -> String {
    let (tag, style) = match event.level {
        LogLevel::Error => ("err", Paint::Error),
        LogLevel::Warning => ("wrn", Paint::Warn),
        LogLevel::Info => ("inf", Paint::Accent),
        LogLevel::Debug => ("dbg", Paint::Dim),
        LogLevel::Unknown => ("???", Paint::Dim),
    };
    let stamp = paint(&format!("[{}]", format_timestamp(event.timestamp)), color, Paint::Dim);
    let indent = if grouped { "    " } else { "" };
    format!(
        "{stamp} {} {}: {indent}{}",
        paint(tag, color, style),
        event.module,
        event.message
    )
}

fn plain_adc(sample: &AdcSample, color: bool) -> String {
    fn field(name: &str, value: Option<f64>, unit: &str) -> String {
        value.map_or_else(|| format!("{name}=-"), |v| format!("{name}={v}{unit}"))
    }

    format!(
        "{} [{}] {} {} {} {} {} {}",
        paint("adc", color, Paint::Accent),
        format_timestamp(sample.timestamp),
        field("vbat", sample.vbat, "V"),
        field("ibat", sample.ibat, "mA"),
        field("tbat", sample.tbat, "C"),
        field("soc", sample.soc, "%"),
        field("tte", sample.tte, "s"),
        field("ttf", sample.ttf, "s"),
    )
}

fn plain_section(section: &ErrorLogSection, color: bool) -> String {
    let mut out = paint(&format!("{}:", section.kind), color, Paint::Warn);
    for line in &section.lines {
        out.push_str("\n  ");
        out.push_str(line);
    }
    out
}

// ── Structured renderers ─────────────────────────────────────────────

fn render_json<T: Serialize + ?Sized>(data: &T, compact: bool) -> Result<String, CliError> {
    let text = if compact {
        serde_json::to_string(data)?
    } else {
        serde_json::to_string_pretty(data)?
    };
    Ok(text)
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pmlink_core::{ErrorLogKind, IrqEvent, UsbPower};

    fn plain() -> Renderer {
        Renderer {
            format: OutputFormat::Plain,
            color: false,
            quiet: false,
        }
    }

    #[test]
    fn timestamps_render_as_clock() {
        assert_eq!(format_timestamp(0), "00:00:00.000");
        assert_eq!(format_timestamp(3_723_004), "01:02:03.004");
        assert_eq!(format_timestamp(359_999_999), "99:59:59.999");
    }

    #[test]
    fn log_lines_keep_module_and_level() {
        let event = DeviceEvent::Log {
            event: LoggingEvent {
                timestamp: 1_500,
                level: LogLevel::Warning,
                module: "module_pmic".into(),
                message: "Charger enabled".into(),
            },
            grouped: false,
        };
        assert_eq!(
            plain().event(&event).unwrap(),
            "[00:00:01.500] wrn module_pmic: Charger enabled"
        );
    }

    #[test]
    fn adc_sample_marks_missing_fields() {
        let sample = AdcSample {
            timestamp: 1_000,
            vbat: Some(3.7),
            ibat: None,
            ..AdcSample::default()
        };
        let text = plain_event(&DeviceEvent::AdcSample(sample), false);
        assert!(text.starts_with("adc [00:00:01.000] vbat=3.7V ibat=- "), "{text}");
    }

    #[test]
    fn sections_list_their_lines() {
        let mut section = ErrorLogSection::new(ErrorLogKind::ChargerError);
        section.lines.push("DIE_TEMP_HIGH".into());
        assert_eq!(
            plain_event(&DeviceEvent::ErrorLogs(section), false),
            "charger-error:\n  DIE_TEMP_HIGH"
        );
    }

    #[test]
    fn simple_events() {
        assert_eq!(
            plain_event(&DeviceEvent::Irq(IrqEvent::new("EVENTSVBUSIN0SET", "EVENTVBUSDETECTED")), false),
            "irq EVENTSVBUSIN0SET EVENTVBUSDETECTED"
        );
        assert_eq!(
            plain_event(&DeviceEvent::UsbPower(UsbPower::HighPower3A), false),
            "usb-c high-power-3a (3000 mA)"
        );
        assert_eq!(plain_event(&DeviceEvent::UsbPowered(false), false), "vbus removed");
    }

    #[test]
    fn compact_json_is_one_line() {
        let renderer = Renderer {
            format: OutputFormat::JsonCompact,
            ..plain()
        };
        let text = renderer
            .event(&DeviceEvent::Connectivity(ConnectivityState::PendingReboot))
            .unwrap();
        assert_eq!(text, r#"{"kind":"connectivity","data":"pending-reboot"}"#);
    }

    #[test]
    fn command_results_in_json_carry_status() {
        let renderer = Renderer {
            format: OutputFormat::JsonCompact,
            ..plain()
        };
        let text = renderer
            .result("help", &CommandResult::Error("unknown".into()))
            .unwrap();
        assert_eq!(text, r#"{"command":"help","status":"error","text":"unknown"}"#);
    }
}
