use crate::encoder::EncoderConfig;
use crate::source::Source;

const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

/// 需要伪装来源的内容平台（防盗链校验）
struct ProvenanceRule {
    host_suffixes: &'static [&'static str],
    referer: &'static str,
    origin: &'static str,
}

const PROVENANCE_RULES: &[ProvenanceRule] = &[
    ProvenanceRule {
        host_suffixes: &["googlevideo.com", "youtube.com"],
        referer: "https://www.youtube.com/",
        origin: "https://www.youtube.com",
    },
    ProvenanceRule {
        host_suffixes: &["vimeocdn.com", "vimeo.com"],
        referer: "https://vimeo.com/",
        origin: "https://vimeo.com",
    },
    ProvenanceRule {
        host_suffixes: &["twitch.tv", "ttvnw.net"],
        referer: "https://www.twitch.tv/",
        origin: "https://www.twitch.tv",
    },
];

/// 组装完整的 FFmpeg 参数列表
///
/// 顺序：全局参数、输入参数、编码参数、推流目标参数。纯函数，不访问外部状态。
pub fn build_arguments(source: &Source, config: &EncoderConfig, sink_args: &[String]) -> Vec<String> {
    let mut args = vec![
        "-hide_banner".to_string(),
        "-loglevel".to_string(),
        "warning".to_string(),
        // 按原始速率读取输入
        "-re".to_string(),
    ];

    args.extend(input_arguments(source));
    args.extend(config.to_ffmpeg_args());
    args.extend(sink_args.iter().cloned());
    args
}

fn input_arguments(source: &Source) -> Vec<String> {
    let mut args = Vec::new();

    let is_http = source.locator.starts_with("http://") || source.locator.starts_with("https://");
    if is_http {
        args.push("-reconnect".to_string());
        args.push("1".to_string());
        args.push("-reconnect_streamed".to_string());
        args.push("1".to_string());
        args.push("-reconnect_delay_max".to_string());
        args.push("5".to_string());
    }

    if let Some(rule) = provenance_rule(source) {
        args.push("-user_agent".to_string());
        args.push(BROWSER_USER_AGENT.to_string());
        args.push("-headers".to_string());
        args.push(format!(
            "Referer: {}\r\nOrigin: {}\r\n",
            rule.referer, rule.origin
        ));
    }

    args.push("-i".to_string());
    args.push(source.locator.clone());
    args
}

fn provenance_rule(source: &Source) -> Option<&'static ProvenanceRule> {
    let host = source.host()?;
    PROVENANCE_RULES.iter().find(|rule| {
        rule.host_suffixes
            .iter()
            .any(|suffix| host == *suffix || host.ends_with(&format!(".{}", suffix)))
    })
}

/// 单地址输出为 `-f flv <url>`，多地址使用 tee muxer 同时推送
pub fn tee_output(addresses: &[String]) -> Vec<String> {
    match addresses {
        [] => Vec::new(),
        [single] => vec!["-f".to_string(), "flv".to_string(), single.clone()],
        many => {
            let targets = many
                .iter()
                .map(|url| format!("[f=flv:onfail=ignore]{}", url))
                .collect::<Vec<_>>()
                .join("|");
            vec![
                "-map".to_string(),
                "0:v:0".to_string(),
                "-map".to_string(),
                "0:a:0?".to_string(),
                "-f".to_string(),
                "tee".to_string(),
                targets,
            ]
        }
    }
}
