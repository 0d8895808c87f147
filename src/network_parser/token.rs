//! Cookie 令牌的生成、校验、缓存与持久化。
//!
//! 上游接受客户端自行生成的 `novel_web_id`，没有注册步骤，所以只能随机生成候选值，
//! 再拿一个只读接口去探测是否可用。令牌 30 分钟后视为过期，下次取用时惰性刷新。
//!
//! 并发约定：同一时刻只允许一次刷新。刷新进行中到达的调用者会等待并复用这次刷新的结果，
//! 不会再发起第二轮探测。

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, TryLockError};
use std::time::Duration;

use rand::Rng;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::{debug, info, warn};

use super::endpoints::{Endpoints, cookie_value, mask_cookie, page_headers};
use crate::base_system::config::write_atomic;

pub const TOKEN_VALIDITY: Duration = Duration::from_secs(30 * 60);

/// 探测接口返回体超过该长度才算有效（错误页/跳转页都很短）。
const MIN_PROBE_BODY: usize = 200;

const ID_BAND_BASE: u64 = 1_000_000_000_000_000_000;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("连续 {attempts} 个候选 Cookie 均未通过校验")]
    Exhausted { attempts: usize },
    #[error("写入 Cookie 文件 {path} 失败: {source}")]
    Persist { path: PathBuf, source: io::Error },
    #[error("Cookie 序列化失败: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthToken {
    #[serde(rename = "cookie")]
    pub value: String,
    #[serde(
        rename = "update_time",
        alias = "updateTime",
        serialize_with = "time::serde::timestamp::serialize",
        deserialize_with = "issued_at_compat"
    )]
    pub issued_at: OffsetDateTime,
}

/// 兼容两种落盘格式：unix 秒，或旧版 Cookie 文件里的 RFC 3339 字符串。
fn issued_at_compat<'de, D>(de: D) -> Result<OffsetDateTime, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Stamp {
        Unix(i64),
        Text(String),
    }

    match Stamp::deserialize(de)? {
        Stamp::Unix(secs) => {
            OffsetDateTime::from_unix_timestamp(secs).map_err(serde::de::Error::custom)
        }
        Stamp::Text(text) => OffsetDateTime::parse(&text, &Rfc3339).map_err(serde::de::Error::custom),
    }
}

impl AuthToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            issued_at: OffsetDateTime::now_utc(),
        }
    }

    pub fn is_stale_at(&self, now: OffsetDateTime, validity: Duration) -> bool {
        let age = now - self.issued_at;
        age.whole_milliseconds() > validity.as_millis() as i128
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenState {
    Absent,
    Valid,
    Stale,
}

/// 候选 ID 的来源。
pub trait IdSource: Send + Sync {
    fn next_id(&self) -> u64;
}

/// 从 `[6e18, 8e18)` 均匀抽取。
pub struct RandomIdSource;

impl IdSource for RandomIdSource {
    fn next_id(&self) -> u64 {
        rand::rng().random_range(ID_BAND_BASE * 6..ID_BAND_BASE * 8)
    }
}

/// 判断一个候选 Cookie 是否被上游接受。
pub trait TokenValidator: Send + Sync {
    fn validate(&self, cookie: &str) -> bool;
}

pub struct HttpTokenValidator {
    client: Client,
    probe_url: String,
}

impl HttpTokenValidator {
    pub fn new(endpoints: &Endpoints, timeout: Duration) -> reqwest::Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            probe_url: endpoints.token_probe_url(),
        })
    }
}

impl TokenValidator for HttpTokenValidator {
    fn validate(&self, cookie: &str) -> bool {
        let resp = match self
            .client
            .get(&self.probe_url)
            .headers(page_headers(Some(cookie)))
            .send()
        {
            Ok(r) => r,
            Err(e) => {
                debug!(target: "auth", "探测请求失败: {}", e);
                return false;
            }
        };
        match resp.bytes() {
            Ok(body) => body.len() > MIN_PROBE_BODY,
            Err(e) => {
                debug!(target: "auth", "读取探测响应失败: {}", e);
                false
            }
        }
    }
}

/// 令牌的持久化位置。
pub trait TokenStore: Send + Sync {
    fn load(&self) -> Option<AuthToken>;
    fn save(&self, token: &AuthToken) -> Result<(), AuthError>;
}

/// 以 JSON 文件保存令牌：`{"cookie": "...", "update_time": <unix 秒>}`。
/// 读取时也接受旧文件里 RFC 3339 格式的 `updateTime`。
pub struct JsonTokenStore {
    path: PathBuf,
}

impl JsonTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TokenStore for JsonTokenStore {
    fn load(&self) -> Option<AuthToken> {
        let bytes = fs::read(&self.path).ok()?;
        match serde_json::from_slice::<AuthToken>(&bytes) {
            Ok(token) => Some(token),
            Err(e) => {
                warn!(target: "auth", path = %self.path.display(), "Cookie 文件无法解析，忽略: {}", e);
                None
            }
        }
    }

    fn save(&self, token: &AuthToken) -> Result<(), AuthError> {
        let bytes = serde_json::to_vec(token)?;
        write_atomic(&self.path, &bytes).map_err(|source| AuthError::Persist {
            path: self.path.clone(),
            source,
        })
    }
}

/// 只在内存中保存，不落盘。
#[derive(Default)]
pub struct MemoryTokenStore {
    slot: Mutex<Option<AuthToken>>,
}

impl MemoryTokenStore {
    pub fn with_token(token: AuthToken) -> Self {
        Self {
            slot: Mutex::new(Some(token)),
        }
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> Option<AuthToken> {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn save(&self, token: &AuthToken) -> Result<(), AuthError> {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(token.clone());
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct AuthoritySettings {
    pub validity: Duration,
    /// 单次刷新最多生成的候选数。
    pub probe_attempts: usize,
    /// `get_token` 遇到缺失/过期令牌时的刷新次数。
    pub refresh_attempts: u32,
    /// 线性退避单位：第 n 次失败后等待 n 个单位。
    pub backoff_unit: Duration,
    pub probe_jitter: (Duration, Duration),
}

impl Default for AuthoritySettings {
    fn default() -> Self {
        Self {
            validity: TOKEN_VALIDITY,
            probe_attempts: 10,
            refresh_attempts: 3,
            backoff_unit: Duration::from_secs(1),
            probe_jitter: (Duration::from_millis(50), Duration::from_millis(150)),
        }
    }
}

enum RefreshOutcome {
    Performed(Result<String, AuthError>),
    /// 等待期间已有其他调用者完成了刷新。
    Reused,
}

pub struct TokenAuthority {
    current: Mutex<Option<AuthToken>>,
    gate: Mutex<()>,
    generation: AtomicU64,
    ids: Arc<dyn IdSource>,
    validator: Arc<dyn TokenValidator>,
    store: Arc<dyn TokenStore>,
    settings: AuthoritySettings,
}

impl TokenAuthority {
    /// 构造时从 `store` 读取上次保存的令牌。
    pub fn new(
        ids: Arc<dyn IdSource>,
        validator: Arc<dyn TokenValidator>,
        store: Arc<dyn TokenStore>,
        settings: AuthoritySettings,
    ) -> Self {
        let cached = store.load();
        if let Some(token) = &cached {
            info!(target: "auth", cookie = %mask_cookie(&token.value), "载入已保存的 Cookie");
        }
        Self {
            current: Mutex::new(cached),
            gate: Mutex::new(()),
            generation: AtomicU64::new(0),
            ids,
            validator,
            store,
            settings,
        }
    }

    /// 线上默认组合：随机 ID + HTTP 探测 + JSON 文件。
    pub fn for_site(
        endpoints: &Endpoints,
        timeout: Duration,
        cookie_file: impl Into<PathBuf>,
    ) -> reqwest::Result<Self> {
        let validator = HttpTokenValidator::new(endpoints, timeout)?;
        Ok(Self::new(
            Arc::new(RandomIdSource),
            Arc::new(validator),
            Arc::new(JsonTokenStore::new(cookie_file)),
            AuthoritySettings::default(),
        ))
    }

    pub fn state(&self) -> TokenState {
        match self.snapshot() {
            None => TokenState::Absent,
            Some(t) if t.is_stale_at(OffsetDateTime::now_utc(), self.settings.validity) => {
                TokenState::Stale
            }
            Some(_) => TokenState::Valid,
        }
    }

    pub fn snapshot(&self) -> Option<AuthToken> {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn fresh_value(&self) -> Option<String> {
        let guard = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        guard
            .as_ref()
            .filter(|t| !t.is_stale_at(OffsetDateTime::now_utc(), self.settings.validity))
            .map(|t| t.value.clone())
    }

    /// 取当前令牌；缺失或过期时先尝试刷新。
    ///
    /// 有刷新正在进行时先等它结束，避免拿着即将被替换的旧值去请求。
    /// 刷新失败只记日志，仍返回缓存值（可能过期，也可能为空字符串），
    /// 由后续请求的内容校验去发现令牌失效。
    pub fn get_token(&self) -> String {
        if let Some(value) = self.fresh_value() {
            match self.gate.try_lock() {
                Ok(_) | Err(TryLockError::Poisoned(_)) => return value,
                Err(TryLockError::WouldBlock) => {
                    drop(self.gate.lock().unwrap_or_else(PoisonError::into_inner));
                    if let Some(value) = self.fresh_value() {
                        return value;
                    }
                }
            }
        }

        let attempts = self.settings.refresh_attempts.max(1);
        let mut seen = self.generation.load(Ordering::Acquire);
        for attempt in 1..=attempts {
            match self.refresh_serialized(seen, |current| current.is_none()) {
                RefreshOutcome::Reused | RefreshOutcome::Performed(Ok(_)) => break,
                RefreshOutcome::Performed(Err(err)) => {
                    warn!(target: "auth", attempt, "第 {} 次刷新 Cookie 失败: {}", attempt, err);
                    std::thread::sleep(self.settings.backoff_unit * attempt);
                    seen = self.generation.load(Ordering::Acquire);
                }
            }
        }

        self.snapshot().map(|t| t.value).unwrap_or_default()
    }

    /// 强制刷新，不管当前令牌是否可用。
    pub fn refresh(&self) -> Result<String, AuthError> {
        let seen = self.generation.load(Ordering::Acquire);
        match self.refresh_serialized(seen, |_| true) {
            RefreshOutcome::Performed(result) => result,
            RefreshOutcome::Reused => self.reused_value(),
        }
    }

    /// 上游拒绝了 `rejected` 之后调用。若当前令牌已被其他调用者换成别的值，
    /// 直接复用，不再生成新令牌。
    pub fn refresh_rejected(&self, rejected: &str) -> Result<String, AuthError> {
        let seen = self.generation.load(Ordering::Acquire);
        let outcome = self.refresh_serialized(seen, |current| {
            current.is_none_or(|value| value == rejected)
        });
        match outcome {
            RefreshOutcome::Performed(result) => result,
            RefreshOutcome::Reused => self.reused_value(),
        }
    }

    fn reused_value(&self) -> Result<String, AuthError> {
        self.fresh_value().ok_or(AuthError::Exhausted {
            attempts: self.settings.probe_attempts,
        })
    }

    /// 持有 `gate` 时判断是否仍需生成：等待期间别人已完成刷新则复用；
    /// `needs_mint` 收到当前仍新鲜的令牌值（没有则为 `None`）。
    fn refresh_serialized(
        &self,
        seen: u64,
        needs_mint: impl FnOnce(Option<&str>) -> bool,
    ) -> RefreshOutcome {
        let _gate = self.gate.lock().unwrap_or_else(PoisonError::into_inner);
        if self.generation.load(Ordering::Acquire) != seen {
            return RefreshOutcome::Reused;
        }
        if !needs_mint(self.fresh_value().as_deref()) {
            return RefreshOutcome::Reused;
        }
        let result = self.mint();
        self.generation.fetch_add(1, Ordering::AcqRel);
        RefreshOutcome::Performed(result)
    }

    fn mint(&self) -> Result<String, AuthError> {
        for probe in 1..=self.settings.probe_attempts {
            let cookie = cookie_value(self.ids.next_id());
            self.sleep_probe_jitter();

            if !self.validator.validate(&cookie) {
                debug!(target: "auth", probe, "候选 Cookie 未通过校验");
                continue;
            }

            let token = AuthToken::new(cookie.clone());
            *self.current.lock().unwrap_or_else(PoisonError::into_inner) = Some(token.clone());
            if let Err(err) = self.store.save(&token) {
                warn!(target: "auth", "Cookie 已更新但保存失败: {}", err);
            }
            info!(target: "auth", probe, cookie = %mask_cookie(&cookie), "Cookie 刷新成功");
            return Ok(cookie);
        }
        Err(AuthError::Exhausted {
            attempts: self.settings.probe_attempts,
        })
    }

    fn sleep_probe_jitter(&self) {
        let (lo, hi) = self.settings.probe_jitter;
        if hi.is_zero() {
            return;
        }
        let wait = if hi > lo {
            rand::rng().random_range(lo..=hi)
        } else {
            lo
        };
        std::thread::sleep(wait);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Barrier;
    use std::sync::atomic::AtomicUsize;

    struct SequenceIds {
        ids: Vec<u64>,
        next: AtomicUsize,
    }

    impl SequenceIds {
        fn new(ids: Vec<u64>) -> Arc<Self> {
            Arc::new(Self {
                ids,
                next: AtomicUsize::new(0),
            })
        }
    }

    impl IdSource for SequenceIds {
        fn next_id(&self) -> u64 {
            let i = self.next.fetch_add(1, Ordering::SeqCst);
            self.ids[i % self.ids.len()]
        }
    }

    struct StubValidator {
        accept: Box<dyn Fn(&str) -> bool + Send + Sync>,
        delay: Duration,
        calls: AtomicUsize,
    }

    impl StubValidator {
        fn new(accept: impl Fn(&str) -> bool + Send + Sync + 'static) -> Arc<Self> {
            Self::slow(accept, Duration::ZERO)
        }

        fn slow(accept: impl Fn(&str) -> bool + Send + Sync + 'static, delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                accept: Box::new(accept),
                delay,
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl TokenValidator for StubValidator {
        fn validate(&self, cookie: &str) -> bool {
            self.calls.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(self.delay);
            (self.accept)(cookie)
        }
    }

    fn quick() -> AuthoritySettings {
        AuthoritySettings {
            backoff_unit: Duration::ZERO,
            probe_jitter: (Duration::ZERO, Duration::ZERO),
            ..AuthoritySettings::default()
        }
    }

    fn authority(
        ids: Arc<dyn IdSource>,
        validator: Arc<StubValidator>,
        store: Arc<MemoryTokenStore>,
    ) -> TokenAuthority {
        TokenAuthority::new(ids, validator, store, quick())
    }

    #[test]
    fn absent_token_is_minted_and_persisted() {
        let ids = SequenceIds::new(vec![6_000_000_000_000_000_001, 6_000_000_000_000_000_002]);
        let validator = StubValidator::new(|c| c.ends_with("002"));
        let store = Arc::new(MemoryTokenStore::default());
        let auth = authority(ids, validator.clone(), store.clone());

        assert_eq!(auth.state(), TokenState::Absent);
        let token = auth.get_token();
        assert_eq!(token, "novel_web_id=6000000000000000002");
        assert_eq!(validator.calls(), 2);
        assert_eq!(auth.state(), TokenState::Valid);
        assert_eq!(store.load().unwrap().value, token);

        // 缓存命中，不再探测
        assert_eq!(auth.get_token(), token);
        assert_eq!(validator.calls(), 2);
    }

    #[test]
    fn refresh_gives_up_after_ten_candidates() {
        let validator = StubValidator::new(|_| false);
        let auth = authority(
            SequenceIds::new(vec![7_000_000_000_000_000_000]),
            validator.clone(),
            Arc::new(MemoryTokenStore::default()),
        );
        match auth.refresh() {
            Err(AuthError::Exhausted { attempts }) => assert_eq!(attempts, 10),
            other => panic!("unexpected: {other:?}"),
        }
        assert_eq!(validator.calls(), 10);
        assert_eq!(auth.state(), TokenState::Absent);
    }

    #[test]
    fn get_token_swallows_refresh_failure() {
        let validator = StubValidator::new(|_| false);
        let auth = authority(
            SequenceIds::new(vec![7_000_000_000_000_000_000]),
            validator.clone(),
            Arc::new(MemoryTokenStore::default()),
        );
        assert_eq!(auth.get_token(), "");
        assert_eq!(validator.calls(), 30);
    }

    #[test]
    fn stale_token_is_refreshed_on_access() {
        let mut old = AuthToken::new("novel_web_id=1");
        old.issued_at -= time::Duration::minutes(31);
        let store = Arc::new(MemoryTokenStore::with_token(old));
        let validator = StubValidator::new(|_| true);
        let auth = authority(
            SequenceIds::new(vec![6_500_000_000_000_000_000]),
            validator.clone(),
            store,
        );

        assert_eq!(auth.state(), TokenState::Stale);
        assert_eq!(auth.get_token(), "novel_web_id=6500000000000000000");
        assert_eq!(validator.calls(), 1);
    }

    #[test]
    fn stale_token_is_returned_when_refresh_fails() {
        let mut old = AuthToken::new("novel_web_id=1");
        old.issued_at -= time::Duration::hours(2);
        let auth = authority(
            SequenceIds::new(vec![1]),
            StubValidator::new(|_| false),
            Arc::new(MemoryTokenStore::with_token(old)),
        );
        assert_eq!(auth.get_token(), "novel_web_id=1");
        assert_eq!(auth.state(), TokenState::Stale);
    }

    #[test]
    fn valid_cached_token_skips_probing() {
        let store = Arc::new(MemoryTokenStore::with_token(AuthToken::new("novel_web_id=9")));
        let validator = StubValidator::new(|_| true);
        let auth = authority(SequenceIds::new(vec![1]), validator.clone(), store);
        assert_eq!(auth.get_token(), "novel_web_id=9");
        assert_eq!(validator.calls(), 0);
    }

    #[test]
    fn explicit_refresh_replaces_a_valid_token() {
        let store = Arc::new(MemoryTokenStore::with_token(AuthToken::new("novel_web_id=9")));
        let auth = authority(
            SequenceIds::new(vec![6_100_000_000_000_000_000]),
            StubValidator::new(|_| true),
            store.clone(),
        );
        assert_eq!(auth.refresh().unwrap(), "novel_web_id=6100000000000000000");
        assert_eq!(auth.get_token(), "novel_web_id=6100000000000000000");
        assert_eq!(store.load().unwrap().value, "novel_web_id=6100000000000000000");
    }

    #[test]
    fn concurrent_callers_share_one_refresh() {
        let validator = StubValidator::slow(|_| true, Duration::from_millis(80));
        let auth = Arc::new(authority(
            SequenceIds::new((1..=64).map(|i| 6_000_000_000_000_000_000 + i).collect()),
            validator.clone(),
            Arc::new(MemoryTokenStore::default()),
        ));

        let barrier = Arc::new(Barrier::new(8));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let auth = Arc::clone(&auth);
                let barrier = Arc::clone(&barrier);
                std::thread::spawn(move || {
                    barrier.wait();
                    auth.get_token()
                })
            })
            .collect();

        let tokens: Vec<String> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(validator.calls(), 1);
        assert!(tokens.iter().all(|t| t == &tokens[0]));
        assert_eq!(tokens[0], "novel_web_id=6000000000000000001");
    }

    #[test]
    fn reader_waits_for_refresh_in_flight() {
        let store = Arc::new(MemoryTokenStore::with_token(AuthToken::new("novel_web_id=9")));
        let validator = StubValidator::slow(|_| true, Duration::from_millis(300));
        let auth = Arc::new(authority(
            SequenceIds::new(vec![6_200_000_000_000_000_000]),
            validator.clone(),
            store,
        ));

        let writer = {
            let auth = Arc::clone(&auth);
            std::thread::spawn(move || auth.refresh().unwrap())
        };
        std::thread::sleep(Duration::from_millis(50));
        let seen = auth.get_token();
        let minted = writer.join().unwrap();

        assert_eq!(minted, "novel_web_id=6200000000000000000");
        assert_eq!(seen, minted);

        // 旧值被拒时，已有的新值直接复用
        assert_eq!(auth.refresh_rejected("novel_web_id=9").unwrap(), minted);
        assert_eq!(validator.calls(), 1);
    }

    #[test]
    fn rejected_current_token_is_replaced() {
        let store = Arc::new(MemoryTokenStore::with_token(AuthToken::new("novel_web_id=9")));
        let validator = StubValidator::new(|_| true);
        let auth = authority(
            SequenceIds::new(vec![6_300_000_000_000_000_000]),
            validator.clone(),
            store,
        );
        assert_eq!(
            auth.refresh_rejected("novel_web_id=9").unwrap(),
            "novel_web_id=6300000000000000000"
        );
        assert_eq!(validator.calls(), 1);
    }

    #[test]
    fn failed_refreshes_back_off_linearly() {
        let validator = StubValidator::new(|_| false);
        let settings = AuthoritySettings {
            backoff_unit: Duration::from_millis(10),
            probe_jitter: (Duration::ZERO, Duration::ZERO),
            ..AuthoritySettings::default()
        };
        let auth = TokenAuthority::new(
            SequenceIds::new(vec![7_000_000_000_000_000_000]),
            validator.clone(),
            Arc::new(MemoryTokenStore::default()),
            settings,
        );

        let started = std::time::Instant::now();
        assert_eq!(auth.get_token(), "");
        // 10ms + 20ms + 30ms
        assert!(started.elapsed() >= Duration::from_millis(60));
        assert_eq!(validator.calls(), 30);
    }

    #[test]
    fn legacy_rfc3339_cookie_file_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cookie.json");
        fs::write(
            &path,
            r#"{"cookie":"novel_web_id=1","updateTime":"2024-05-01T12:00:00.123456789+08:00"}"#,
        )
        .unwrap();

        let loaded = JsonTokenStore::new(&path).load().unwrap();
        assert_eq!(loaded.value, "novel_web_id=1");
        assert_eq!(loaded.issued_at.unix_timestamp(), 1_714_536_000);
    }

    #[test]
    fn random_ids_stay_in_band() {
        let src = RandomIdSource;
        for _ in 0..100 {
            let id = src.next_id();
            assert!((6 * ID_BAND_BASE..8 * ID_BAND_BASE).contains(&id));
        }
    }

    #[test]
    fn json_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data").join("cookie.json");
        let store = JsonTokenStore::new(&path);
        assert!(store.load().is_none());

        let token = AuthToken::new("novel_web_id=6000000000000000123");
        store.save(&token).unwrap();

        let raw: serde_json::Value = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        assert_eq!(raw["cookie"], "novel_web_id=6000000000000000123");
        assert!(raw["update_time"].is_i64());

        let loaded = store.load().unwrap();
        assert_eq!(loaded.value, token.value);
        assert_eq!(loaded.issued_at.unix_timestamp(), token.issued_at.unix_timestamp());
    }

    #[test]
    fn corrupt_store_file_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cookie.json");
        fs::write(&path, b"{not json").unwrap();
        assert!(JsonTokenStore::new(&path).load().is_none());
    }
}
