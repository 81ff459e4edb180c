//! A simple demo sequence that fades each channel up and down in turn.

use std::time::Duration;

use log::info;
use tokio::time::sleep;

use crate::control_interface::Device;
use crate::error::Result;

/// Number of steps in each half of a fade.
pub const LIGHTSHOW_STEPS: u32 = 50;
/// Intensity added per step.
pub const LIGHTSHOW_STEP_SIZE: u32 = 2;
/// Pause between two frames.
pub const LIGHTSHOW_FRAME_DELAY: Duration = Duration::from_millis(30);

/// Frames that fade `channel` up and back down while every other channel
/// stays off. Starts and ends with all channels off.
pub fn ramp_frames(channel_count: usize, channel: usize) -> Vec<Vec<u32>> {
    let mut intensities = vec![0u32; channel_count];
    let mut frames = vec![intensities.clone()];
    if channel >= channel_count {
        return frames;
    }

    let up = 1..LIGHTSHOW_STEPS;
    let down = (0..=LIGHTSHOW_STEPS).rev();
    for step in up.chain(down) {
        intensities[channel] = LIGHTSHOW_STEP_SIZE * step;
        frames.push(intensities.clone());
    }

    frames.push(vec![0; channel_count]);
    frames
}

/// Fades every channel of `device` up and down, one after the other.
pub async fn run_lightshow(device: &Device, channel_count: usize) -> Result<()> {
    for channel in 0..channel_count {
        info!("Lightshow on channel {} of {}", channel, device.address());
        for (index, frame) in ramp_frames(channel_count, channel).iter().enumerate() {
            if index > 0 {
                sleep(LIGHTSHOW_FRAME_DELAY).await;
            }
            device.set_intensities(frame).await?;
        }
    }
    Ok(())
}
