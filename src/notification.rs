//! Desktop notifications
//!
//! Sends notifications via notify-rust, picking `FreeDesktop` standard icon
//! names from the device description.

use color_eyre::eyre::{Context, Result};
use notify_rust::Notification;

use crate::pulse::{DeviceDescriptor, Role};

/// Send a desktop notification
///
/// # Errors
/// Returns an error if the notification cannot be sent (e.g., no notification daemon running).
pub fn send_notification(summary: &str, body: &str, icon: Option<&str>) -> Result<()> {
    let icon = icon.unwrap_or("audio-card");

    Notification::new()
        .summary(summary)
        .body(body)
        .appname("plugsw")
        .icon(icon)
        .timeout(3000)
        .show()
        .wrap_err("Failed to show notification")?;

    Ok(())
}

/// Guess an icon for a device from its description and node name
#[must_use]
pub fn get_device_icon(device: &DeviceDescriptor) -> &'static str {
    let desc = device.description.to_lowercase();
    let name = device.name.to_lowercase();

    let headset = ["headset", "headphone", "earbuds"]
        .iter()
        .any(|word| desc.contains(word))
        || name.contains("bluez");

    match device.role {
        Role::Output if headset => "audio-headphones",
        Role::Output if desc.contains("hdmi") || name.contains("hdmi") => "video-display",
        Role::Output => "audio-speakers",
        Role::Source if headset => "audio-headset",
        Role::Source if desc.contains("webcam") || desc.contains("camera") => "camera-web",
        Role::Source => "audio-input-microphone",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn device(role: Role, name: &str, description: &str) -> DeviceDescriptor {
        DeviceDescriptor {
            index: 0,
            name: name.to_string(),
            description: description.to_string(),
            role,
        }
    }

    #[rstest]
    #[case(Role::Output, "alsa_output.usb", "USB Headset Analog Stereo", "audio-headphones")]
    #[case(Role::Output, "bluez_output.00_11", "WH-1000XM4", "audio-headphones")]
    #[case(Role::Output, "alsa_output.pci.hdmi-stereo", "Display Port", "video-display")]
    #[case(Role::Output, "alsa_output.pci.analog", "Built-in Audio", "audio-speakers")]
    #[case(Role::Source, "alsa_input.usb", "USB Headset Mono", "audio-headset")]
    #[case(Role::Source, "alsa_input.usb-cam", "HD Webcam C920", "camera-web")]
    #[case(Role::Source, "alsa_input.usb-mic", "Yeti Stereo Microphone", "audio-input-microphone")]
    fn test_get_device_icon(
        #[case] role: Role,
        #[case] name: &str,
        #[case] description: &str,
        #[case] expected: &str,
    ) {
        assert_eq!(get_device_icon(&device(role, name, description)), expected);
    }
}
