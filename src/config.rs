//! Channel plan derived from the command line and the opened input.

use crate::output::{EncoderSettings, OutputChannel, Reflection, VideoCodec, WindowSurface};
use std::path::PathBuf;

/// Output-related command line options.
#[derive(Clone, Debug, PartialEq)]
pub struct OutputOptions {
    /// Left channel width; 0 = input width, negative = disabled
    pub left_width: i32,
    /// Right channel width; 0 = input width, negative = disabled
    pub right_width: i32,
    pub windows: bool,
    pub save: bool,
    pub codec: VideoCodec,
    /// The input is a live camera rather than a media file
    pub camera_input: bool,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct InputGeometry {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
}

/// Everything needed to construct one output channel.
#[derive(Clone, Debug, PartialEq)]
pub struct ChannelPlan {
    pub title: String,
    pub reflection: Reflection,
    pub width: u32,
    pub height: u32,
    pub display: bool,
    pub file: Option<EncoderSettings>,
}

impl ChannelPlan {
    pub fn into_channel(self) -> OutputChannel {
        let mut channel = OutputChannel::new(self.title.as_str(), self.width, self.reflection);
        if self.display {
            channel = channel.with_display(Box::new(WindowSurface::new(self.title.as_str())));
        }
        if let Some(settings) = &self.file {
            channel.set_file_output(settings);
        }
        tracing::info!(
            "Channel {}: {:?}, {}x{}, display {}, file {}",
            self.title,
            self.reflection,
            self.width,
            self.height,
            if self.display { "on" } else { "off" },
            self.file
                .as_ref()
                .map(|f| f.path.display().to_string())
                .unwrap_or_else(|| "off".to_string())
        );
        channel
    }
}

/// Resolve a channel width option: negative disables, zero means input width.
pub fn resolve_width(requested: i32, input_width: u32) -> Option<u32> {
    match requested {
        w if w < 0 => None,
        0 => Some(input_width),
        w => Some(w as u32),
    }
}

/// Plan the output channels in dispatch order: left, right, input.
pub fn plan_channels(options: &OutputOptions, input: InputGeometry) -> Vec<ChannelPlan> {
    let file = |stem: &str, width: u32| {
        options.save.then(|| EncoderSettings {
            path: PathBuf::from(format!("{}{}", stem, options.codec.extension())),
            codec: options.codec,
            fps: input.fps,
            size: (width, input.height),
        })
    };

    let reflected = [
        ("Left", "left", Reflection::Left, options.left_width),
        ("Right", "right", Reflection::Right, options.right_width),
    ];

    let mut plans: Vec<ChannelPlan> = reflected
        .into_iter()
        .filter_map(|(title, stem, reflection, requested)| {
            let width = resolve_width(requested, input.width)?;
            Some(ChannelPlan {
                title: title.to_string(),
                reflection,
                width,
                height: input.height,
                display: options.windows,
                file: file(stem, width),
            })
        })
        .collect();

    plans.push(ChannelPlan {
        title: "Input".to_string(),
        reflection: Reflection::None,
        width: input.width,
        height: input.height,
        display: options.windows,
        file: if options.camera_input {
            file("camera", input.width)
        } else {
            None
        },
    });

    plans
}
