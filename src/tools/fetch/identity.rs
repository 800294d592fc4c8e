//! Identities: the user-agent / referer / cookie combination presented to the
//! target for one attempt.
//!
//! Identities are built per attempt and thrown away. A rotator lives for one
//! orchestrated fetch only, so nothing leaks between concurrent fetches.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use url::Url;

use super::types::CookieJar;
use crate::tools::clean::origin_of;

/// Realistic desktop browser user-agents.
pub const USER_AGENTS: [&str; 6] = [
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/127.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:127.0) Gecko/20100101 Firefox/127.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 14_4) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.5 Safari/605.1.15",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36 Edg/126.0.0.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/127.0.0.0 Safari/537.36",
];

/// Well-known search engines used as cross-site referers.
pub const SEARCH_REFERERS: [&str; 2] = ["https://www.google.com/", "https://www.bing.com/"];

/// How the referer relates to the target, mirrored in `Sec-Fetch-Site`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SiteHint {
    SameOrigin,
    CrossSite,
    None,
}

impl SiteHint {
    /// Compare the referer's host with the target's host.
    pub fn between(referer: &str, target: &Url) -> Self {
        if referer.is_empty() {
            return Self::None;
        }
        let same_host = Url::parse(referer)
            .ok()
            .and_then(|r| r.host_str().map(|h| h.eq_ignore_ascii_case(target.host_str().unwrap_or(""))))
            .unwrap_or(false);
        if same_host {
            Self::SameOrigin
        } else {
            Self::CrossSite
        }
    }

    pub fn as_header(&self) -> &'static str {
        match self {
            Self::SameOrigin => "same-origin",
            Self::CrossSite => "cross-site",
            Self::None => "none",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_agent: String,
    /// Empty means no `Referer` header.
    pub referer: String,
    pub cookies: CookieJar,
    pub site_hint: SiteHint,
}

impl Identity {
    pub fn new(user_agent: &str, referer: &str, cookies: &CookieJar, target: &Url) -> Self {
        Self {
            user_agent: user_agent.to_string(),
            referer: referer.to_string(),
            cookies: cookies.clone(),
            site_hint: SiteHint::between(referer, target),
        }
    }

    pub fn cookie_header(&self) -> Option<String> {
        self.cookies.header_value()
    }
}

/// Referer candidates tried for each user-agent while rotating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RefererSlot {
    Empty,
    Origin,
    Search(&'static str),
}

const REFERER_SLOTS: [RefererSlot; 4] = [
    RefererSlot::Empty,
    RefererSlot::Origin,
    RefererSlot::Search(SEARCH_REFERERS[0]),
    RefererSlot::Search(SEARCH_REFERERS[1]),
];

/// Hands out identities for one orchestrated fetch.
pub struct IdentityRotator {
    target: Url,
    origin: String,
    user_agent: Option<String>,
    referer: Option<String>,
    cookies: CookieJar,
    pool: Vec<&'static str>,
    used: HashSet<&'static str>,
    rng: StdRng,
}

impl IdentityRotator {
    pub fn new(
        target: &Url,
        user_agent: Option<&str>,
        referer: Option<&str>,
        cookies: &CookieJar,
    ) -> Self {
        Self {
            target: target.clone(),
            origin: origin_of(target),
            user_agent: user_agent.map(str::to_string),
            referer: referer.map(str::to_string),
            cookies: cookies.clone(),
            pool: USER_AGENTS.to_vec(),
            used: HashSet::new(),
            rng: StdRng::from_entropy(),
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// Draw a pool user-agent not used yet in this fetch; once every pool
    /// member was handed out, repeats are allowed again.
    fn sample_user_agent(&mut self) -> &'static str {
        let fresh: Vec<&'static str> = self
            .pool
            .iter()
            .copied()
            .filter(|ua| !self.used.contains(ua))
            .collect();
        let candidates = if fresh.is_empty() {
            self.used.clear();
            self.pool.clone()
        } else {
            fresh
        };
        let ua = candidates
            .choose(&mut self.rng)
            .copied()
            .unwrap_or(USER_AGENTS[0]);
        self.used.insert(ua);
        ua
    }

    /// Caller user-agent when given, otherwise a fresh pool pick.
    fn user_agent_or_sample(&mut self) -> String {
        match self.user_agent.clone() {
            Some(ua) => ua,
            None => self.sample_user_agent().to_string(),
        }
    }

    /// Identity for the cookie-priming request to the site root.
    pub fn priming(&mut self) -> Identity {
        let ua = self.user_agent_or_sample();
        let origin = self.origin.clone();
        Identity::new(&ua, &origin, &self.cookies, &self.target)
    }

    /// Caller overrides first, then pool defaults (referer falls back to the
    /// target's own origin).
    pub fn pick(&mut self) -> Identity {
        let ua = self.user_agent_or_sample();
        let referer = self.referer.clone().unwrap_or_else(|| self.origin.clone());
        Identity::new(&ua, &referer, &self.cookies, &self.target)
    }

    /// Identity for the browser tier: caller referer only, never a default.
    pub fn for_browser(&mut self) -> Identity {
        let ua = self.user_agent_or_sample();
        let referer = self.referer.clone().unwrap_or_default();
        Identity::new(&ua, &referer, &self.cookies, &self.target)
    }

    /// Full rotation plan: up to `max_user_agents` distinct pool user-agents,
    /// each paired with every referer candidate before moving to the next.
    pub fn rotation(&mut self, max_user_agents: usize) -> Vec<Identity> {
        let count = max_user_agents.min(self.pool.len());

        // Unused pool members first, then the ones already handed out;
        // never the same user-agent twice within one pass.
        let (mut fresh, mut seen): (Vec<&'static str>, Vec<&'static str>) = self
            .pool
            .iter()
            .copied()
            .partition(|ua| !self.used.contains(ua));
        fresh.shuffle(&mut self.rng);
        seen.shuffle(&mut self.rng);
        let user_agents: Vec<&'static str> = fresh.into_iter().chain(seen).take(count).collect();
        self.used.extend(user_agents.iter().copied());

        let mut plan = Vec::with_capacity(count * REFERER_SLOTS.len());
        for ua in user_agents {
            for slot in REFERER_SLOTS {
                let referer = match slot {
                    RefererSlot::Empty => String::new(),
                    RefererSlot::Origin => self.origin.clone(),
                    RefererSlot::Search(url) => url.to_string(),
                };
                plan.push(Identity::new(ua, &referer, &self.cookies, &self.target));
            }
        }
        plan
    }

    /// Number of referer candidates per user-agent.
    pub fn referer_candidates() -> usize {
        REFERER_SLOTS.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target() -> Url {
        Url::parse("https://shop.example.com/item/42").unwrap()
    }

    #[test]
    fn site_hint_from_referer() {
        let t = target();
        assert_eq!(SiteHint::between("", &t), SiteHint::None);
        assert_eq!(
            SiteHint::between("https://shop.example.com/", &t),
            SiteHint::SameOrigin
        );
        assert_eq!(
            SiteHint::between("https://www.google.com/", &t),
            SiteHint::CrossSite
        );
        assert_eq!(SiteHint::CrossSite.as_header(), "cross-site");
    }

    #[test]
    fn explicit_overrides_win() {
        let mut rotator = IdentityRotator::new(
            &target(),
            Some("MyAgent/1.0"),
            Some("https://www.bing.com/"),
            &CookieJar::new(),
        );
        let identity = rotator.pick();
        assert_eq!(identity.user_agent, "MyAgent/1.0");
        assert_eq!(identity.referer, "https://www.bing.com/");
        assert_eq!(identity.site_hint, SiteHint::CrossSite);
    }

    #[test]
    fn default_referer_is_own_origin() {
        let mut rotator = IdentityRotator::new(&target(), None, None, &CookieJar::new());
        let identity = rotator.pick();
        assert_eq!(identity.referer, "https://shop.example.com");
        assert_eq!(identity.site_hint, SiteHint::SameOrigin);
        assert!(USER_AGENTS.contains(&identity.user_agent.as_str()));
    }

    #[test]
    fn picks_without_replacement_until_pool_exhausted() {
        let mut rotator =
            IdentityRotator::new(&target(), None, None, &CookieJar::new()).with_seed(7);
        let picked: HashSet<String> = (0..USER_AGENTS.len())
            .map(|_| rotator.pick().user_agent)
            .collect();
        assert_eq!(picked.len(), USER_AGENTS.len());
        // Pool exhausted: repeats are allowed again instead of panicking.
        assert!(USER_AGENTS.contains(&rotator.pick().user_agent.as_str()));
    }

    #[test]
    fn rotation_plan_shape() {
        let mut rotator =
            IdentityRotator::new(&target(), None, None, &CookieJar::new()).with_seed(3);
        let plan = rotator.rotation(5);
        assert_eq!(plan.len(), 20);

        // Referers are exhausted before the user-agent changes.
        for chunk in plan.chunks(IdentityRotator::referer_candidates()) {
            assert!(chunk.iter().all(|i| i.user_agent == chunk[0].user_agent));
            let referers: Vec<&str> = chunk.iter().map(|i| i.referer.as_str()).collect();
            assert_eq!(
                referers,
                vec![
                    "",
                    "https://shop.example.com",
                    "https://www.google.com/",
                    "https://www.bing.com/"
                ]
            );
        }

        let distinct: HashSet<&str> = plan.iter().map(|i| i.user_agent.as_str()).collect();
        assert_eq!(distinct.len(), 5);
    }

    #[test]
    fn rotation_is_capped_by_pool_size() {
        let mut rotator = IdentityRotator::new(&target(), None, None, &CookieJar::new());
        let plan = rotator.rotation(50);
        assert_eq!(plan.len(), USER_AGENTS.len() * IdentityRotator::referer_candidates());
    }

    #[test]
    fn cookies_ride_along() {
        let jar = CookieJar::parse("sid=abc; theme=dark");
        let mut rotator = IdentityRotator::new(&target(), None, None, &jar);
        let identity = rotator.priming();
        assert_eq!(identity.cookie_header().as_deref(), Some("sid=abc; theme=dark"));
        assert_eq!(identity.site_hint, SiteHint::SameOrigin);
    }

    #[test]
    fn browser_identity_has_no_default_referer() {
        let mut rotator = IdentityRotator::new(&target(), None, None, &CookieJar::new());
        let identity = rotator.for_browser();
        assert!(identity.referer.is_empty());
        assert_eq!(identity.site_hint, SiteHint::None);
    }
}
