//! `pmlink info`: show what the engine will assume about the device.

use std::fmt::Write as _;

use serde::Serialize;

use pmlink_core::DeviceProfile;

use crate::cli::GlobalOpts;
use crate::config;
use crate::error::CliError;
use crate::output::Renderer;

#[derive(Debug, Serialize)]
struct InfoView<'a> {
    profile_name: Option<&'a str>,
    endpoint: Option<String>,
    command_timeout_ms: u128,
    auto_reboot: bool,
    device: &'a DeviceProfile,
}

pub fn handle(global: &GlobalOpts, renderer: Renderer) -> Result<(), CliError> {
    let resolved = config::resolve(global)?;
    let view = InfoView {
        profile_name: resolved.profile_name.as_deref(),
        endpoint: resolved.endpoint.as_ref().map(ToString::to_string),
        command_timeout_ms: resolved.engine.command_timeout.as_millis(),
        auto_reboot: resolved.engine.auto_reboot,
        device: &resolved.engine.profile,
    };

    renderer.print(&renderer.value(&view, plain_info)?);
    Ok(())
}

fn plain_info(view: &InfoView<'_>) -> String {
    let device = view.device;
    let yes_no = |flag: bool| if flag { "yes" } else { "no" };

    let mut out = String::new();
    let _ = writeln!(out, "profile:          {}", view.profile_name.unwrap_or("(defaults)"));
    let _ = writeln!(out, "endpoint:         {}", view.endpoint.as_deref().unwrap_or("(none)"));
    let _ = writeln!(out, "command timeout:  {} ms", view.command_timeout_ms);
    let _ = writeln!(out, "auto reboot:      {}", yes_no(view.auto_reboot));
    let _ = writeln!(out, "model:            {}", device.model);
    let _ = writeln!(out, "bucks:            {}", device.bucks);
    let _ = writeln!(out, "ldos:             {}", device.ldos);
    let _ = writeln!(out, "gpios:            {}", device.gpios);
    let _ = writeln!(out, "leds:             {}", device.leds);
    let _ = writeln!(out, "fuel gauge:       {}", yes_no(device.fuel_gauge));
    let _ = writeln!(out, "usb-c detection:  {}", yes_no(device.usb_cc_detection));
    let _ = writeln!(out, "error logs:       {}", yes_no(device.error_logs));
    let _ = write!(out, "modules:          {}", device.known_modules().join(", "));
    out
}
