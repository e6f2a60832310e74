use super::transport::RawResponse;

// Tokens that only appear on Cloudflare-style interstitials, never on listing pages
const CHALLENGE_MARKERS: &[&str] = &[
    "cf-browser-verification",
    "cf_chl_opt",
    "cf-challenge-running",
    "/cdn-cgi/challenge-platform/",
    "Checking your browser before accessing",
    "<title>Just a moment...</title>",
    "Attention Required! | Cloudflare",
];

/// Whether a response is an anti-bot interstitial instead of real content.
pub fn is_challenge(response: &RawResponse) -> bool {
    CHALLENGE_MARKERS
        .iter()
        .any(|marker| response.body.contains(marker))
}
