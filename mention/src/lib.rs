//! Pure mention grammar (spec.md §4.B): turns a raw chat message into a [`ParsedMention`].
//!
//! No I/O here; the launch pipeline is responsible for everything downstream of the parsed
//! fields (defaults cascade, remote launch, persistence).

use regex::Regex;
use std::sync::OnceLock;

/// The options a mention can carry, after grammar resolution.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ParsedMention {
    pub prompt: String,
    pub repo: Option<String>,
    pub branch: Option<String>,
    pub model: Option<String>,
    pub auto_pr: Option<bool>,
    /// `agent ` prefix: always launch a new agent, even inside a thread with an existing one.
    pub force_new: bool,
    /// `--direct` / `direct=true`: skip both HITL stages.
    pub hitl_direct: bool,
    /// `--no-review` / `no-review=true`: skip the context-review stage only.
    pub hitl_no_review: bool,
    /// `--no-plan` / `no-plan=true`: skip the plan-loop stage only.
    pub hitl_no_plan: bool,
}

#[derive(Default)]
struct Options {
    repo: Option<String>,
    branch: Option<String>,
    model: Option<String>,
    auto_pr: Option<bool>,
    hitl_direct: bool,
    hitl_no_review: bool,
    hitl_no_plan: bool,
    any: bool,
}

impl Options {
    /// Merges `other` in, keeping `self`'s values where already set (higher precedence wins by
    /// being applied first: bracket, then inline, then natural-language).
    fn merge_lower_precedence(&mut self, other: Options) {
        self.any = self.any || other.any;
        self.repo = self.repo.take().or(other.repo);
        self.branch = self.branch.take().or(other.branch);
        self.model = self.model.take().or(other.model);
        self.auto_pr = self.auto_pr.or(other.auto_pr);
        self.hitl_direct = self.hitl_direct || other.hitl_direct;
        self.hitl_no_review = self.hitl_no_review || other.hitl_no_review;
        self.hitl_no_plan = self.hitl_no_plan || other.hitl_no_plan;
    }
}

fn bracket_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*\[([^\]]*)\]").unwrap())
}

fn kv_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b(repo|branch|model|autopr|direct|no-review|no-plan)\s*=\s*([^\s,\]]+)").unwrap()
    })
}

fn bare_flag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)--(direct|no-review|no-plan)\b").unwrap())
}

fn natural_in_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\bin\s+([^\s,]+),?").unwrap())
}

fn natural_with_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\bwith\s+([^\s,]+),?").unwrap())
}

fn agent_prefix_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^agent\b\s*").unwrap())
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

fn set_kv(opts: &mut Options, key: &str, value: &str) {
    match key.to_ascii_lowercase().as_str() {
        "repo" => opts.repo = Some(value.to_string()),
        "branch" => opts.branch = Some(value.to_string()),
        "model" => opts.model = Some(value.to_string()),
        "autopr" => opts.auto_pr = parse_bool(value),
        "direct" => opts.hitl_direct = parse_bool(value).unwrap_or(true),
        "no-review" => opts.hitl_no_review = parse_bool(value).unwrap_or(true),
        "no-plan" => opts.hitl_no_plan = parse_bool(value).unwrap_or(true),
        _ => {}
    }
}

/// Extracts a leading `[k=v, k=v, …]` block, if present at the very start of `text`.
fn extract_bracket(text: &str) -> (Options, String) {
    let mut opts = Options::default();
    match bracket_re().captures(text) {
        Some(caps) => {
            let whole = caps.get(0).unwrap();
            let body = caps.get(1).unwrap().as_str();
            for pair in body.split(',') {
                if let Some((k, v)) = pair.split_once('=') {
                    set_kv(&mut opts, k.trim(), v.trim());
                    opts.any = true;
                }
            }
            (opts, text[whole.end()..].to_string())
        }
        None => (opts, text.to_string()),
    }
}

/// Extracts every `key=value` pair anywhere in `text`, removing each match.
fn extract_inline(text: &str) -> (Options, String) {
    let mut opts = Options::default();
    let mut remainder = kv_re()
        .replace_all(text, |caps: &regex::Captures| {
            set_kv(&mut opts, &caps[1], &caps[2]);
            opts.any = true;
            ""
        })
        .to_string();
    remainder = bare_flag_re()
        .replace_all(&remainder, |caps: &regex::Captures| {
            match caps[1].to_ascii_lowercase().as_str() {
                "direct" => opts.hitl_direct = true,
                "no-review" => opts.hitl_no_review = true,
                "no-plan" => opts.hitl_no_plan = true,
                _ => {}
            }
            opts.any = true;
            ""
        })
        .to_string();
    (opts, remainder)
}

/// Extracts `in <repo>` / `with <model>` natural-language phrases, removing each match.
fn extract_natural(text: &str) -> (Options, String) {
    let mut opts = Options::default();
    let mut remainder = natural_in_re()
        .replace(text, |caps: &regex::Captures| {
            opts.repo = Some(caps[1].to_string());
            opts.any = true;
            ""
        })
        .to_string();
    remainder = natural_with_re()
        .replace(&remainder, |caps: &regex::Captures| {
            opts.model = Some(caps[1].to_string());
            opts.any = true;
            ""
        })
        .to_string();
    (opts, remainder)
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Parses `message` for a mention of `bot_mention` (e.g. `"@bot"`), applied case-insensitively.
///
/// Returns `None` if the mention is absent, or if after stripping the mention the remaining
/// text carries neither a recognized option nor any prompt text (spec.md §4.B step 7).
pub fn parse(message: &str, bot_mention: &str) -> Option<ParsedMention> {
    let lower_msg = message.to_lowercase();
    let lower_mention = bot_mention.to_lowercase();
    let byte_idx = lower_msg.find(&lower_mention)?;
    let after = &message[byte_idx + bot_mention.len()..];
    let mut rest = after.trim_start().to_string();

    let force_new = if let Some(m) = agent_prefix_re().find(&rest) {
        rest = rest[m.end()..].to_string();
        true
    } else {
        false
    };

    let (bracket_opts, rest) = extract_bracket(&rest);
    let (inline_opts, rest) = extract_inline(&rest);
    let (natural_opts, rest) = extract_natural(&rest);

    let mut opts = bracket_opts;
    opts.merge_lower_precedence(inline_opts);
    opts.merge_lower_precedence(natural_opts);

    let prompt = collapse_whitespace(&rest);

    if prompt.is_empty() && !opts.any && !force_new {
        return None;
    }

    Some(ParsedMention {
        prompt,
        repo: opts.repo,
        branch: opts.branch,
        model: opts.model,
        auto_pr: opts.auto_pr,
        force_new,
        hitl_direct: opts.hitl_direct,
        hitl_no_review: opts.hitl_no_review,
        hitl_no_plan: opts.hitl_no_plan,
    })
}

const BRANCH_SLUG_MAX_LEN: usize = 50;

fn non_alphanumeric_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^a-z0-9]+").unwrap())
}

/// Derives the `cursor/<slug>` target branch name from a prompt (spec.md §4.F): lowercase the
/// first `BRANCH_SLUG_MAX_LEN` characters, collapse runs of non-alphanumerics to `-`, trim
/// leading/trailing `-`. Falls back to `agent-<unix_secs>` if that leaves nothing (an
/// all-non-alpha prompt).
pub fn branch_slug(prompt: &str, unix_secs: i64) -> String {
    let truncated: String = prompt.chars().take(BRANCH_SLUG_MAX_LEN).collect();
    let lowered = truncated.to_lowercase();
    let collapsed = non_alphanumeric_re().replace_all(&lowered, "-");
    let trimmed = collapsed.trim_matches('-');
    if trimmed.is_empty() {
        format!("cursor/agent-{unix_secs}")
    } else {
        format!("cursor/{trimmed}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_mention_is_none() {
        assert_eq!(parse("hello there", "@bot"), None);
    }

    #[test]
    fn bare_mention_with_no_prompt_is_none() {
        assert_eq!(parse("@bot", "@bot"), None);
        assert_eq!(parse("@bot   ", "@bot"), None);
    }

    #[test]
    fn agent_prefix_sets_force_new() {
        let m = parse("@bot agent fix the bug", "@bot").unwrap();
        assert!(m.force_new);
        assert_eq!(m.prompt, "fix the bug");
    }

    #[test]
    fn bracket_precedes_inline_precedes_natural() {
        let m = parse("@bot [repo=a/b] repo=c/d in e/f fix it", "@bot").unwrap();
        assert_eq!(m.repo.as_deref(), Some("a/b"));
    }

    #[test]
    fn inline_precedes_natural() {
        let m = parse("@bot repo=c/d in e/f fix it", "@bot").unwrap();
        assert_eq!(m.repo.as_deref(), Some("c/d"));
    }

    #[test]
    fn natural_language_in_and_with_scenario_1() {
        let m = parse(
            "@bot in org/repo, with claude, fix the login bug",
            "@bot",
        )
        .unwrap();
        assert_eq!(m.repo.as_deref(), Some("org/repo"));
        assert_eq!(m.model.as_deref(), Some("claude"));
        assert_eq!(m.prompt, "fix the login bug");
    }

    #[test]
    fn bare_hitl_flags_are_recognized() {
        let m = parse("@bot --direct fix the thing", "@bot").unwrap();
        assert!(m.hitl_direct);
        assert_eq!(m.prompt, "fix the thing");
    }

    #[test]
    fn kv_hitl_flags_are_recognized() {
        let m = parse("@bot no-plan=true fix the thing", "@bot").unwrap();
        assert!(m.hitl_no_plan);
    }

    #[test]
    fn mention_is_case_insensitive() {
        let m = parse("@BOT fix it", "@bot").unwrap();
        assert_eq!(m.prompt, "fix it");
    }

    #[test]
    fn branch_slug_collapses_non_alphanumerics() {
        assert_eq!(branch_slug("Fix the login bug!!", 0), "cursor/fix-the-login-bug");
    }

    #[test]
    fn branch_slug_falls_back_for_all_non_alpha_prompt() {
        assert_eq!(branch_slug("!!! ### ???", 1700000000), "cursor/agent-1700000000");
    }

    #[test]
    fn branch_slug_truncates_to_max_len() {
        let prompt = "a".repeat(100);
        let slug = branch_slug(&prompt, 0);
        assert_eq!(slug, format!("cursor/{}", "a".repeat(BRANCH_SLUG_MAX_LEN)));
    }

    #[test]
    fn options_only_mention_is_not_none() {
        let m = parse("@bot repo=a/b", "@bot").unwrap();
        assert_eq!(m.prompt, "");
        assert_eq!(m.repo.as_deref(), Some("a/b"));
    }
}
