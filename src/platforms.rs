//! Short-video platforms a surface can show.

use serde::Serialize;

/// One selectable platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SocialPlatform {
    pub key: &'static str,
    pub label: &'static str,
    pub url: &'static str,
}

pub const PLATFORMS: &[SocialPlatform] = &[
    SocialPlatform {
        key: "instagram",
        label: "Instagram Reels",
        url: "https://www.instagram.com/reels/",
    },
    SocialPlatform {
        key: "tiktok",
        label: "TikTok",
        url: "https://www.tiktok.com/foryou",
    },
    SocialPlatform {
        key: "youtube",
        label: "YouTube Shorts",
        url: "https://www.youtube.com/shorts",
    },
    SocialPlatform {
        key: "twitter",
        label: "X (Twitter)",
        url: "https://x.com/home",
    },
    SocialPlatform {
        key: "reddit",
        label: "Reddit",
        url: "https://www.reddit.com",
    },
    SocialPlatform {
        key: "snapchat",
        label: "Snapchat Spotlight",
        url: "https://www.snapchat.com/spotlight",
    },
    SocialPlatform {
        key: "facebook",
        label: "Facebook Reels",
        url: "https://www.facebook.com/reel/",
    },
];

/// Look up a platform by key
pub fn find(key: &str) -> Option<&'static SocialPlatform> {
    PLATFORMS.iter().find(|p| p.key == key)
}

/// Look up a platform by key, falling back to the first one
pub fn find_or_default(key: &str) -> &'static SocialPlatform {
    find(key).unwrap_or(&PLATFORMS[0])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find() {
        assert_eq!(find("tiktok").map(|p| p.url), Some("https://www.tiktok.com/foryou"));
        assert!(find("myspace").is_none());
    }

    #[test]
    fn test_find_or_default() {
        assert_eq!(find_or_default("myspace").key, "instagram");
        assert_eq!(find_or_default("reddit").label, "Reddit");
    }

    #[test]
    fn test_keys_unique() {
        let mut keys: Vec<_> = PLATFORMS.iter().map(|p| p.key).collect();
        keys.sort();
        keys.dedup();
        assert_eq!(keys.len(), PLATFORMS.len());
    }
}
