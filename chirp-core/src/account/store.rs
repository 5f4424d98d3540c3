//! 账户存储：每个账户一个 JSON 文档，外加邮箱 / 用户名 / Google ID 三个索引文件

use super::models::{Account, OtpChallenge, OtpPurpose};
use crate::error::{AuthError, Result};
use chrono::Utc;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use subtle::ConstantTimeEq;
use tokio::sync::Mutex;
use tracing::{info, instrument};

const EMAIL_INDEX: &str = "email_index";
const USERNAME_INDEX: &str = "username_index";
const GOOGLE_INDEX: &str = "google_index";

/// 账户存储
#[derive(Debug, Clone)]
pub struct AccountStore {
    /// 账户数据存储目录
    data_dir: PathBuf,
    /// 写锁：唯一性检查 + 插入、OTP 读取后清除等复合操作必须原子
    lock: Arc<Mutex<()>>,
}

/// 常数时间比较验证码，长度不同直接判否
fn code_matches(expected: &str, given: &str) -> bool {
    expected.as_bytes().ct_eq(given.as_bytes()).into()
}

// ============================================================================
// 构造器和内部辅助方法
// ============================================================================

impl AccountStore {
    /// 创建新的账户存储
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
            lock: Arc::new(Mutex::new(())),
        }
    }

    /// 确保账户目录存在
    pub fn ensure_dirs(&self) -> Result<()> {
        fs::create_dir_all(self.accounts_dir())?;
        Ok(())
    }

    /// 账户存储目录
    fn accounts_dir(&self) -> PathBuf {
        self.data_dir.join("accounts")
    }

    /// 账户文件路径
    fn account_path(&self, id: &str) -> PathBuf {
        self.accounts_dir().join(format!("{}.json", id))
    }

    /// 索引文件路径
    fn index_path(&self, name: &str) -> PathBuf {
        self.accounts_dir().join(format!("{}.json", name))
    }

    /// 加载键 -> 账户 ID 索引
    fn load_index(&self, name: &str) -> HashMap<String, String> {
        if let Ok(data) = fs::read(self.index_path(name)) {
            if let Ok(map) = serde_json::from_slice::<HashMap<String, String>>(&data) {
                return map;
            }
        }
        HashMap::new()
    }

    /// 保存索引
    fn save_index(&self, name: &str, index: &HashMap<String, String>) -> Result<()> {
        let data = serde_json::to_vec_pretty(index)?;
        fs::write(self.index_path(name), data)?;
        Ok(())
    }

    /// 持久化账户数据
    fn persist(&self, account: &Account) -> Result<()> {
        let data = serde_json::to_vec_pretty(account)?;
        fs::write(self.account_path(&account.id), data)?;
        Ok(())
    }

    /// 读取账户文件，不存在时返回 NotFound
    fn read_account(&self, id: &str) -> Result<Account> {
        let path = self.account_path(id);
        if !path.exists() {
            return Err(AuthError::NotFound(format!("account: {}", id)));
        }
        let data = fs::read(&path)?;
        Ok(serde_json::from_slice(&data)?)
    }
}

// ============================================================================
// 读取操作
// ============================================================================

impl AccountStore {
    /// 获取账户
    #[instrument(skip(self))]
    pub async fn get(&self, id: &str) -> Result<Account> {
        self.read_account(id)
    }

    /// 通过邮箱查找
    #[instrument(skip(self))]
    pub async fn find_by_email(&self, email: &str) -> Result<Option<Account>> {
        self.find_indexed(EMAIL_INDEX, email, |a| Some(a.email.as_str()))
            .await
    }

    /// 通过用户名查找
    #[instrument(skip(self))]
    pub async fn find_by_username(&self, username: &str) -> Result<Option<Account>> {
        self.find_indexed(USERNAME_INDEX, username, |a| Some(a.username.as_str()))
            .await
    }

    /// 通过 Google ID 查找
    #[instrument(skip(self))]
    pub async fn find_by_google_id(&self, google_id: &str) -> Result<Option<Account>> {
        self.find_indexed(GOOGLE_INDEX, google_id, |a| a.google_id.as_deref())
            .await
    }

    /// 索引查找（优先索引命中，索引失效时回退全量扫描并自愈索引）
    async fn find_indexed<F>(&self, name: &str, key: &str, field: F) -> Result<Option<Account>>
    where
        F: Fn(&Account) -> Option<&str>,
    {
        self.ensure_dirs()?;
        let index = self.load_index(name);

        if let Some(id) = index.get(key) {
            match self.read_account(id) {
                Ok(account) => return Ok(Some(account)),
                Err(AuthError::NotFound(_)) => {
                    // 索引指向的账户不存在，清理索引项
                    let mut index = index;
                    index.remove(key);
                    let _ = self.save_index(name, &index);
                }
                Err(e) => return Err(e),
            }
        }

        // 索引中没有，逐个读取账户文件，找到匹配即停止
        let dir = self.accounts_dir();
        if !dir.exists() {
            return Ok(None);
        }
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            let path = entry.path();
            if !is_account_file(&path) {
                continue;
            }
            if let Ok(data) = fs::read(&path) {
                if let Ok(account) = serde_json::from_slice::<Account>(&data) {
                    if field(&account) == Some(key) {
                        let mut index = self.load_index(name);
                        index.insert(key.to_string(), account.id.clone());
                        let _ = self.save_index(name, &index);
                        return Ok(Some(account));
                    }
                }
            }
        }

        Ok(None)
    }
}

/// 跳过索引文件，只认普通账户文档
fn is_account_file(path: &Path) -> bool {
    path.extension().map(|e| e == "json").unwrap_or(false)
        && path
            .file_stem()
            .and_then(|s| s.to_str())
            .map(|s| !s.ends_with("_index"))
            .unwrap_or(false)
}

// ============================================================================
// 写入操作（全部持锁）
// ============================================================================

impl AccountStore {
    /// 创建账户；邮箱 / 用户名 / Google ID 的唯一性检查与插入在同一把锁内完成
    #[instrument(skip(self, account), fields(username = %account.username, email = %account.email))]
    pub async fn create(&self, account: Account) -> Result<Account> {
        let _guard = self.lock.lock().await;
        self.ensure_dirs()?;

        let mut email_index = self.load_index(EMAIL_INDEX);
        if email_index.contains_key(&account.email) {
            return Err(AuthError::AlreadyExists(format!("email: {}", account.email)));
        }
        let mut username_index = self.load_index(USERNAME_INDEX);
        if username_index.contains_key(&account.username) {
            return Err(AuthError::AlreadyExists(format!(
                "username: {}",
                account.username
            )));
        }
        let mut google_index = self.load_index(GOOGLE_INDEX);
        if let Some(google_id) = &account.google_id {
            if google_index.contains_key(google_id) {
                return Err(AuthError::AlreadyExists(format!("google id: {}", google_id)));
            }
        }

        self.persist(&account)?;
        email_index.insert(account.email.clone(), account.id.clone());
        self.save_index(EMAIL_INDEX, &email_index)?;
        username_index.insert(account.username.clone(), account.id.clone());
        self.save_index(USERNAME_INDEX, &username_index)?;
        if let Some(google_id) = &account.google_id {
            google_index.insert(google_id.clone(), account.id.clone());
            self.save_index(GOOGLE_INDEX, &google_index)?;
        }

        info!(account_id = %account.id, "created account");
        Ok(account)
    }

    /// 写入指定用途的 OTP 挑战，只覆盖同用途槽位
    #[instrument(skip(self, challenge))]
    pub async fn put_challenge(
        &self,
        id: &str,
        purpose: OtpPurpose,
        challenge: OtpChallenge,
    ) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut account = self.read_account(id)?;
        *account.challenge_slot(purpose) = Some(challenge);
        account.updated_at = Some(Utc::now());
        self.persist(&account)?;
        Ok(())
    }

    /// 核对并消费 OTP 挑战：码匹配且未过期才清空槽位（一次性使用）。
    /// 登录用途验证通过即视为邮箱已验证。
    #[instrument(skip(self, code))]
    pub async fn consume_challenge(
        &self,
        id: &str,
        purpose: OtpPurpose,
        code: &str,
    ) -> Result<Account> {
        let _guard = self.lock.lock().await;
        let mut account = self.read_account(id)?;
        check_challenge(account.challenge(purpose), code)?;
        *account.challenge_slot(purpose) = None;
        if purpose == OtpPurpose::Login {
            account.verified = true;
        }
        account.updated_at = Some(Utc::now());
        self.persist(&account)?;
        info!(account_id = %id, "otp challenge consumed");
        Ok(account)
    }

    /// 核对 OTP 挑战但不消费（重置流程第二步的预检）
    #[instrument(skip(self, code))]
    pub async fn peek_challenge(&self, id: &str, purpose: OtpPurpose, code: &str) -> Result<()> {
        let _guard = self.lock.lock().await;
        let account = self.read_account(id)?;
        check_challenge(account.challenge(purpose), code)
    }

    /// 消费重置挑战并写入新密码哈希，单次持久化
    #[instrument(skip(self, code, password_hash))]
    pub async fn consume_reset_and_set_hash(
        &self,
        id: &str,
        code: &str,
        password_hash: String,
    ) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut account = self.read_account(id)?;
        check_challenge(account.challenge(OtpPurpose::PasswordReset), code)?;
        account.reset_otp = None;
        account.password_hash = Some(password_hash);
        account.updated_at = Some(Utc::now());
        self.persist(&account)?;
        info!(account_id = %id, "password hash replaced");
        Ok(())
    }
}

/// 挑战核对：槽位为空、码不匹配、已过期都归并为同一个错误
fn check_challenge(challenge: Option<&OtpChallenge>, code: &str) -> Result<()> {
    let challenge = challenge.ok_or(AuthError::InvalidOrExpired)?;
    if !code_matches(&challenge.code, code) {
        return Err(AuthError::InvalidOrExpired);
    }
    if Utc::now() > challenge.expires_at {
        return Err(AuthError::InvalidOrExpired);
    }
    Ok(())
}
