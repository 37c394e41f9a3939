//! Heuristic content classification.
//!
//! Self-promotion is decided by an ordered list of declarative rules. Rules
//! are evaluated by ascending priority and the first matching rule decides,
//! so exclusions (priority 0) always win over the text and link heuristics.

use selfpromo_core::{CategoryConfig, ClassifierConfig, Comment, Post};
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    NotSelfPromotion,
    SelfPromotion,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// Link flair is exactly one of the listed flairs.
    FlairIn(Vec<String>),
    /// Reddit's own "OC" checkbox.
    OriginalContentFlag,
    /// Flair marks original work and the post is a link, not a self post.
    OriginalFlairOnLink(Vec<String>),
    /// Lower-cased title contains one of the phrases. Word phrases must start a word.
    TitleContains(Vec<String>),
    /// Post URL or a link in the self text points at one of the domains.
    LinksTo(Vec<String>),
    /// Post URL itself is hosted on one of the domains.
    HostedOn(Vec<String>),
}

impl Predicate {
    pub fn matches(&self, post: &Post) -> bool {
        match self {
            Predicate::FlairIn(flairs) => has_flair(post, flairs),
            Predicate::OriginalContentFlag => post.is_original_content,
            Predicate::OriginalFlairOnLink(flairs) => !post.is_self && has_flair(post, flairs),
            Predicate::TitleContains(phrases) => {
                let title = post.title.to_lowercase();
                phrases.iter().any(|phrase| contains_phrase(&title, phrase))
            }
            Predicate::LinksTo(domains) => host_of(&post.url)
                .into_iter()
                .chain(linked_hosts(&post.selftext))
                .any(|host| host_in(&host, domains)),
            Predicate::HostedOn(domains) => {
                host_of(&post.url).map_or(false, |host| host_in(&host, domains))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    pub name: String,
    pub priority: u8,
    pub predicate: Predicate,
    pub verdict: Verdict,
}

impl Rule {
    pub fn new(name: &str, priority: u8, predicate: Predicate, verdict: Verdict) -> Self {
        Self {
            name: name.to_string(),
            priority,
            predicate,
            verdict,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

impl RuleSet {
    /// Rules with equal priority keep their insertion order.
    pub fn new(mut rules: Vec<Rule>) -> Self {
        rules.sort_by_key(|rule| rule.priority);
        Self { rules }
    }

    pub fn from_config(config: &ClassifierConfig) -> Self {
        let lowered = |values: &[String]| -> Vec<String> {
            values.iter().map(|v| v.to_lowercase()).collect()
        };

        Self::new(vec![
            Rule::new(
                "excluded-flair",
                0,
                Predicate::FlairIn(config.excluded_flairs.clone()),
                Verdict::NotSelfPromotion,
            ),
            Rule::new(
                "oc-flag",
                10,
                Predicate::OriginalContentFlag,
                Verdict::SelfPromotion,
            ),
            Rule::new(
                "original-flair",
                20,
                Predicate::OriginalFlairOnLink(config.original_flairs.clone()),
                Verdict::SelfPromotion,
            ),
            Rule::new(
                "oc-marker",
                30,
                Predicate::TitleContains(lowered(&config.original_markers)),
                Verdict::SelfPromotion,
            ),
            Rule::new(
                "authorship-phrase",
                40,
                Predicate::TitleContains(lowered(&config.authorship_phrases)),
                Verdict::SelfPromotion,
            ),
            Rule::new(
                "promotion-domain",
                50,
                Predicate::LinksTo(normalized(&config.promotion_domains)),
                Verdict::SelfPromotion,
            ),
            Rule::new(
                "media-host",
                60,
                Predicate::HostedOn(normalized(&config.media_domains)),
                Verdict::SelfPromotion,
            ),
        ])
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// First rule whose predicate matches, in priority order.
    pub fn decide(&self, post: &Post) -> Option<&Rule> {
        self.rules.iter().find(|rule| rule.predicate.matches(post))
    }
}

/// A flair whose posts are limited per trailing window.
#[derive(Debug, Clone)]
pub struct CategoryRule {
    pub name: String,
    pub flair: String,
    pub limit: u32,
    pub window: chrono::Duration,
    /// Window length in whole days, for messages.
    pub window_days: u32,
    pub removal_message: Option<String>,
}

impl From<&CategoryConfig> for CategoryRule {
    fn from(config: &CategoryConfig) -> Self {
        Self {
            name: config.name.clone(),
            flair: config.flair.clone(),
            limit: config.limit,
            window: config.window.to_duration(),
            window_days: config.window.rounded_days(),
            removal_message: config.removal_message.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub self_promotion: bool,
    /// Name of the rule that decided, if any matched.
    pub decided_by: Option<String>,
    /// Indices into [`Classifier::categories`].
    pub categories: Vec<usize>,
}

#[derive(Debug, Clone)]
pub struct Classifier {
    area: String,
    rules: RuleSet,
    comment_domains: Vec<String>,
    categories: Vec<CategoryRule>,
}

impl Classifier {
    pub fn new(area: &str, config: &ClassifierConfig, categories: &[CategoryConfig]) -> Self {
        Self {
            area: area.to_string(),
            rules: RuleSet::from_config(config),
            comment_domains: normalized(&config.promotion_domains),
            categories: categories.iter().map(CategoryRule::from).collect(),
        }
    }

    pub fn area(&self) -> &str {
        &self.area
    }

    pub fn categories(&self) -> &[CategoryRule] {
        &self.categories
    }

    pub fn classify(&self, post: &Post) -> Classification {
        let decided = self.rules.decide(post);
        Classification {
            self_promotion: decided.map_or(false, |rule| rule.verdict == Verdict::SelfPromotion),
            decided_by: decided.map(|rule| rule.name.clone()),
            categories: self
                .categories
                .iter()
                .enumerate()
                .filter(|(_, category)| self.matches_category(post, category))
                .map(|(index, _)| index)
                .collect(),
        }
    }

    pub fn is_self_promotion(&self, post: &Post) -> bool {
        self.rules
            .decide(post)
            .map_or(false, |rule| rule.verdict == Verdict::SelfPromotion)
    }

    /// Comments only count when they link to a promotion domain.
    pub fn is_self_promotion_comment(&self, comment: &Comment) -> bool {
        linked_hosts(&comment.body).any(|host| host_in(&host, &self.comment_domains))
    }

    pub fn matches_category(&self, post: &Post, category: &CategoryRule) -> bool {
        post.is_in_area(&self.area) && post.link_flair_text.as_deref() == Some(category.flair.as_str())
    }
}

fn has_flair(post: &Post, flairs: &[String]) -> bool {
    post.link_flair_text
        .as_deref()
        .map_or(false, |flair| flairs.iter().any(|f| f == flair))
}

fn normalized(domains: &[String]) -> Vec<String> {
    domains.iter().map(|d| normalize_host(d)).collect()
}

fn normalize_host(host: &str) -> String {
    let host = host.trim().trim_end_matches('.').to_lowercase();
    host.strip_prefix("www.").map(str::to_string).unwrap_or(host)
}

pub fn host_of(raw: &str) -> Option<String> {
    let parsed = Url::parse(raw.trim()).ok()?;
    match parsed.scheme() {
        "http" | "https" => parsed.host_str().map(normalize_host),
        _ => None,
    }
}

/// `i.imgur.com` matches `imgur.com`, `notimgur.com` does not.
pub fn host_in(host: &str, domains: &[String]) -> bool {
    domains.iter().any(|domain| {
        host == domain
            || host
                .strip_suffix(domain.as_str())
                .map_or(false, |prefix| prefix.ends_with('.'))
    })
}

/// Hosts of the links found in free text, including markdown links.
pub fn linked_hosts(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| c.is_whitespace() || matches!(c, '(' | ')' | '[' | ']' | '<' | '>' | '"'))
        .filter_map(|token| {
            let token = token.trim_end_matches(|c: char| matches!(c, '.' | ',' | ';' | '!' | '?'));
            if token.starts_with("http://") || token.starts_with("https://") {
                host_of(token)
            } else if looks_like_domain(token) {
                host_of(&format!("https://{}", token))
            } else {
                None
            }
        })
}

/// Bare `youtube.com/@me` style mentions: a dotted host before the first `/`.
fn looks_like_domain(token: &str) -> bool {
    let host = token.split('/').next().unwrap_or_default();
    host.contains('.')
        && !host.starts_with('.')
        && !host.ends_with('.')
        && host.chars().all(|c| c.is_alphanumeric() || matches!(c, '.' | '-'))
}

/// Word phrases match at a word start, so "my " does not hit "enemy ".
/// Bracketed markers such as "[oc]" match anywhere.
fn contains_phrase(haystack: &str, phrase: &str) -> bool {
    match phrase.chars().next() {
        None => return false,
        Some(first) if !first.is_alphanumeric() => return haystack.contains(phrase),
        Some(_) => {}
    }
    haystack.match_indices(phrase).any(|(start, _)| {
        haystack[..start]
            .chars()
            .next_back()
            .map_or(true, |previous| !previous.is_alphanumeric())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn post(title: &str, flair: Option<&str>, url: &str) -> Post {
        Post {
            id: "p1".to_string(),
            author: "artist".to_string(),
            created_utc: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
            subreddit: "anime".to_string(),
            title: title.to_string(),
            selftext: String::new(),
            url: url.to_string(),
            permalink: "/r/anime/comments/p1/".to_string(),
            link_flair_text: flair.map(str::to_string),
            is_self: false,
            is_original_content: false,
            removed: false,
        }
    }

    fn classifier() -> Classifier {
        Classifier::new(
            "anime",
            &ClassifierConfig::default(),
            &[CategoryConfig {
                name: "fanart".to_string(),
                flair: "Fanart".to_string(),
                limit: 2,
                window: selfpromo_core::WindowSpec::new(6, 23, 45),
                removal_message: None,
            }],
        )
    }

    #[test]
    fn test_exclusion_overrides_heuristics() {
        let classifier = classifier();
        let mut question = post(
            "I made this [OC], is it good?",
            Some("Question"),
            "https://www.youtube.com/watch?v=abc",
        );
        question.is_original_content = true;

        let classification = classifier.classify(&question);
        assert!(!classification.self_promotion);
        assert_eq!(classification.decided_by.as_deref(), Some("excluded-flair"));
    }

    #[test]
    fn test_heuristic_rules() {
        let classifier = classifier();
        let text_only = "https://www.reddit.com/r/anime/comments/p1/";

        assert!(classifier.is_self_promotion(&post("Sketch [OC]", None, text_only)));
        assert!(classifier.is_self_promotion(&post("I drew Frieren", None, text_only)));
        assert!(classifier.is_self_promotion(&post("My cosplay", None, text_only)));
        assert!(classifier.is_self_promotion(&post("Scene", None, "https://youtu.be/xyz")));
        assert!(classifier.is_self_promotion(&post("Scene", None, "https://i.imgur.com/a.png")));
        assert!(classifier.is_self_promotion(&post("Art", Some("Fanart"), text_only)));

        assert!(!classifier.is_self_promotion(&post("Episode 5 discussion", None, text_only)));
        // Word boundary: "enemy " is not "my "
        assert!(!classifier.is_self_promotion(&post("The enemy within", None, text_only)));
    }

    #[test]
    fn test_marker_glued_to_word() {
        let classifier = classifier();
        let mut glued = post("Frieren fanart[OC]", None, "https://www.reddit.com/r/anime/");
        glued.is_self = true;

        let classification = classifier.classify(&glued);
        assert!(classification.self_promotion);
        assert_eq!(classification.decided_by.as_deref(), Some("oc-marker"));

        glued.title = "Frieren fanart(oc) and more".to_string();
        assert!(classifier.is_self_promotion(&glued));

        // Word phrases still need a word start
        glued.title = "Frieren vs the enemy army".to_string();
        assert!(!classifier.is_self_promotion(&glued));
    }

    #[test]
    fn test_original_flair_on_self_post_is_not_promotion() {
        let classifier = classifier();
        let mut self_post = post("Art thread", Some("Fanart"), "https://www.reddit.com/r/anime/");
        self_post.is_self = true;
        assert!(!classifier.is_self_promotion(&self_post));
    }

    #[test]
    fn test_promotion_link_in_self_text() {
        let classifier = classifier();
        let mut self_post = post("Thoughts", None, "https://www.reddit.com/r/anime/");
        self_post.is_self = true;
        self_post.selftext = "Full video [here](https://www.twitch.tv/someone).".to_string();
        assert!(classifier.is_self_promotion(&self_post));
    }

    #[test]
    fn test_comment_classification() {
        let classifier = classifier();
        let mut comment = Comment {
            id: "c1".to_string(),
            author: "artist".to_string(),
            created_utc: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
            subreddit: "anime".to_string(),
            body: "Check my channel https://youtube.com/@me!".to_string(),
            link_id: "p1".to_string(),
            link_author: None,
            removed: false,
        };
        assert!(classifier.is_self_promotion_comment(&comment));

        comment.body = "Agreed, great episode".to_string();
        assert!(!classifier.is_self_promotion_comment(&comment));
    }

    #[test]
    fn test_domain_without_scheme() {
        let classifier = classifier();
        let mut comment = Comment {
            id: "c2".to_string(),
            author: "artist".to_string(),
            created_utc: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
            subreddit: "anime".to_string(),
            body: "Full video on youtube.com/@artist".to_string(),
            link_id: "p1".to_string(),
            link_author: None,
            removed: false,
        };
        assert!(classifier.is_self_promotion_comment(&comment));

        comment.body = "Sources: e.g. the manga, vol. 3. See reddit.com/r/anime too".to_string();
        assert!(!classifier.is_self_promotion_comment(&comment));

        let hosts: Vec<String> = linked_hosts("find me at Twitch.tv/someone, or www.patreon.com").collect();
        assert_eq!(hosts, vec!["twitch.tv".to_string(), "patreon.com".to_string()]);
    }

    #[test]
    fn test_category_requires_area_and_exact_flair() {
        let classifier = classifier();
        let url = "https://i.redd.it/a.png";

        assert_eq!(classifier.classify(&post("Art", Some("Fanart"), url)).categories, vec![0]);
        assert!(classifier.classify(&post("Art", Some("fanart"), url)).categories.is_empty());

        let mut elsewhere = post("Art", Some("Fanart"), url);
        elsewhere.subreddit = "manga".to_string();
        assert!(classifier.classify(&elsewhere).categories.is_empty());
    }

    #[test]
    fn test_host_matching() {
        let domains = vec!["imgur.com".to_string()];
        assert!(host_in("imgur.com", &domains));
        assert!(host_in("i.imgur.com", &domains));
        assert!(!host_in("notimgur.com", &domains));
        assert_eq!(host_of("https://WWW.YouTube.com/watch"), Some("youtube.com".to_string()));
        assert_eq!(host_of("not a url"), None);
    }

    #[test]
    fn test_rules_sorted_by_priority() {
        let rules = RuleSet::new(vec![
            Rule::new("late", 90, Predicate::OriginalContentFlag, Verdict::SelfPromotion),
            Rule::new("early", 1, Predicate::OriginalContentFlag, Verdict::NotSelfPromotion),
        ]);
        let mut oc = post("Art", None, "https://example.com");
        oc.is_original_content = true;
        assert_eq!(rules.decide(&oc).map(|r| r.name.as_str()), Some("early"));
    }
}
