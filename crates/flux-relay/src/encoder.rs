use crate::error::{RelayError, Result};
use flux_config::{EncoderOverrides, Preset};
use serde::{Deserialize, Serialize};

const MIN_FRAMERATE: u32 = 1;
const MAX_FRAMERATE: u32 = 120;

/// 编码配置
///
/// 构造和每次更新时都会完整校验，校验失败不会留下部分修改。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncoderConfig {
    /// 分辨率（宽x高）
    pub resolution: String,

    /// 帧率
    pub framerate: u32,

    /// 视频码率，如 "2500k"
    pub video_bitrate: String,

    /// 音频码率，如 "128k"
    pub audio_bitrate: String,

    pub video_codec: String,

    pub audio_codec: String,

    /// 编码预设
    pub preset: Preset,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            resolution: "1280x720".to_string(),
            framerate: 30,
            video_bitrate: "2500k".to_string(),
            audio_bitrate: "128k".to_string(),
            video_codec: "libx264".to_string(),
            audio_codec: "aac".to_string(),
            preset: Preset::VeryFast,
        }
    }
}

impl EncoderConfig {
    /// 以默认值为基础应用覆盖项
    pub fn from_overrides(overrides: &EncoderOverrides) -> Result<Self> {
        Self::default().merged(overrides)
    }

    /// 合并覆盖项并校验，返回新配置
    pub fn merged(&self, overrides: &EncoderOverrides) -> Result<Self> {
        let mut config = self.clone();

        if let Some(resolution) = &overrides.resolution {
            config.resolution = resolution.trim().to_string();
        }
        if let Some(framerate) = overrides.framerate {
            config.framerate = framerate;
        }
        if let Some(bitrate) = &overrides.video_bitrate {
            config.video_bitrate = bitrate.trim().to_string();
        }
        if let Some(bitrate) = &overrides.audio_bitrate {
            config.audio_bitrate = bitrate.trim().to_string();
        }
        if let Some(codec) = &overrides.video_codec {
            config.video_codec = codec.trim().to_string();
        }
        if let Some(codec) = &overrides.audio_codec {
            config.audio_codec = codec.trim().to_string();
        }
        if let Some(preset) = overrides.preset {
            config.preset = preset;
        }

        config.validate()?;
        Ok(config)
    }

    /// 校验配置
    pub fn validate(&self) -> Result<()> {
        parse_resolution(&self.resolution)
            .ok_or_else(|| RelayError::InvalidResolution(self.resolution.clone()))?;

        if !(MIN_FRAMERATE..=MAX_FRAMERATE).contains(&self.framerate) {
            return Err(RelayError::InvalidFramerate(self.framerate));
        }

        parse_kbps(&self.video_bitrate).ok_or_else(|| RelayError::InvalidBitrate {
            field: "video",
            value: self.video_bitrate.clone(),
        })?;

        parse_kbps(&self.audio_bitrate).ok_or_else(|| RelayError::InvalidBitrate {
            field: "audio",
            value: self.audio_bitrate.clone(),
        })?;

        if self.video_codec.is_empty() {
            return Err(RelayError::InvalidCodec("video"));
        }
        if self.audio_codec.is_empty() {
            return Err(RelayError::InvalidCodec("audio"));
        }

        Ok(())
    }

    /// GOP 大小（关键帧间隔），固定为 2 秒
    pub fn keyframe_interval(&self) -> u32 {
        self.framerate * 2
    }

    /// 生成 FFmpeg 编码参数
    pub fn to_ffmpeg_args(&self) -> Vec<String> {
        // 码率可达 u32 上限，缓冲区按 u64 计算
        let video_kbps = u64::from(parse_kbps(&self.video_bitrate).unwrap_or(0));

        let mut args = Vec::new();

        // 视频
        args.push("-c:v".to_string());
        args.push(self.video_codec.clone());
        args.push("-preset".to_string());
        args.push(self.preset.as_str().to_string());
        args.push("-b:v".to_string());
        args.push(self.video_bitrate.clone());
        args.push("-maxrate".to_string());
        args.push(self.video_bitrate.clone());
        args.push("-bufsize".to_string());
        args.push(format!("{}k", video_kbps * 2));
        args.push("-s".to_string());
        args.push(self.resolution.clone());
        args.push("-r".to_string());
        args.push(self.framerate.to_string());

        // 固定关键帧节奏：禁用场景切换检测
        args.push("-g".to_string());
        args.push(self.keyframe_interval().to_string());
        args.push("-keyint_min".to_string());
        args.push(self.framerate.to_string());
        args.push("-sc_threshold".to_string());
        args.push("0".to_string());
        args.push("-pix_fmt".to_string());
        args.push("yuv420p".to_string());

        // 音频
        args.push("-c:a".to_string());
        args.push(self.audio_codec.clone());
        args.push("-b:a".to_string());
        args.push(self.audio_bitrate.clone());
        args.push("-ar".to_string());
        args.push("44100".to_string());

        args
    }
}

/// 解析 "1280x720"
fn parse_resolution(value: &str) -> Option<(u32, u32)> {
    let (width, height) = value.split_once('x')?;
    Some((parse_digits(width)?, parse_digits(height)?))
}

/// 解析 "2500k"
fn parse_kbps(value: &str) -> Option<u32> {
    parse_digits(value.strip_suffix('k')?)
}

fn parse_digits(value: &str) -> Option<u32> {
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    value.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_framerate(framerate: u32) -> EncoderOverrides {
        EncoderOverrides {
            framerate: Some(framerate),
            ..Default::default()
        }
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = EncoderConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.keyframe_interval(), 60);
    }

    #[test]
    fn test_framerate_boundaries() {
        let base = EncoderConfig::default();

        assert!(matches!(
            base.merged(&with_framerate(0)),
            Err(RelayError::InvalidFramerate(0))
        ));
        assert!(base.merged(&with_framerate(121)).is_err());
        assert_eq!(base.merged(&with_framerate(1)).unwrap().framerate, 1);
        assert_eq!(base.merged(&with_framerate(120)).unwrap().framerate, 120);
    }

    #[test]
    fn test_bitrate_requires_k_suffix() {
        let base = EncoderConfig::default();

        let rejected = base.merged(&EncoderOverrides {
            video_bitrate: Some("2500".to_string()),
            ..Default::default()
        });
        assert!(matches!(
            rejected,
            Err(RelayError::InvalidBitrate { field: "video", .. })
        ));

        let accepted = base
            .merged(&EncoderOverrides {
                video_bitrate: Some("2500k".to_string()),
                audio_bitrate: Some("160k".to_string()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(accepted.video_bitrate, "2500k");
        assert_eq!(accepted.audio_bitrate, "160k");
    }

    #[test]
    fn test_resolution_format() {
        let base = EncoderConfig::default();

        for bad in ["1280", "1280x", "x720", "1280*720", "1280x720p", "-1x720"] {
            let result = base.merged(&EncoderOverrides {
                resolution: Some(bad.to_string()),
                ..Default::default()
            });
            assert!(result.is_err(), "{} should be rejected", bad);
        }

        let ok = base
            .merged(&EncoderOverrides {
                resolution: Some("1920x1080".to_string()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(ok.resolution, "1920x1080");
    }

    #[test]
    fn test_failed_merge_leaves_original_untouched() {
        let base = EncoderConfig::default();
        let result = base.merged(&EncoderOverrides {
            resolution: Some("1920x1080".to_string()),
            framerate: Some(500),
            ..Default::default()
        });

        assert!(result.is_err());
        assert_eq!(base, EncoderConfig::default());
    }

    #[test]
    fn test_ffmpeg_args_generation() {
        let config = EncoderConfig::from_overrides(&EncoderOverrides {
            framerate: Some(25),
            video_bitrate: Some("3000k".to_string()),
            ..Default::default()
        })
        .unwrap();
        let args = config.to_ffmpeg_args();

        let value_of = |flag: &str| {
            let pos = args.iter().position(|a| a == flag).unwrap();
            args[pos + 1].clone()
        };

        assert_eq!(value_of("-g"), "50");
        assert_eq!(value_of("-keyint_min"), "25");
        assert_eq!(value_of("-sc_threshold"), "0");
        assert_eq!(value_of("-bufsize"), "6000k");
        assert_eq!(value_of("-preset"), "veryfast");
        assert_eq!(value_of("-c:a"), "aac");
    }

    #[test]
    fn test_large_bitrate_bufsize() {
        let config = EncoderConfig::from_overrides(&EncoderOverrides {
            video_bitrate: Some("3000000000k".to_string()),
            ..Default::default()
        })
        .unwrap();
        let args = config.to_ffmpeg_args();

        let pos = args.iter().position(|a| a == "-bufsize").unwrap();
        assert_eq!(args[pos + 1], "6000000000k");
    }
}
