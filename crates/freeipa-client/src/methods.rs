//! Typed wrappers around FreeIPA server methods.
//!
//! Methods whose request is a fixed shape are generated by `rpc_methods!` from a table of
//! method name, positional arguments and options. Methods that validate input, rewrite server
//! errors or combine several calls are written out by hand below the table.

use crate::client::IpaClient;
use crate::group::GroupRecord;
use crate::otp::OtpToken;
use crate::user::User;
use crate::Result;
use freeipa_core::{Error, Options, RpcResult};
use serde_json::Value;
use tracing::{debug, info};

/// Decodes the payload of a successful call into a typed value.
pub trait FromRpcResult: Sized {
    /// Converts `result` into `Self`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ParseError`] if the payload has an unexpected shape.
    fn from_rpc_result(result: RpcResult) -> Result<Self>;
}

impl FromRpcResult for () {
    fn from_rpc_result(_result: RpcResult) -> Result<Self> {
        Ok(())
    }
}

impl FromRpcResult for RpcResult {
    fn from_rpc_result(result: RpcResult) -> Result<Self> {
        Ok(result)
    }
}

impl FromRpcResult for User {
    fn from_rpc_result(result: RpcResult) -> Result<Self> {
        Self::from_value(result.result)
    }
}

impl FromRpcResult for Vec<User> {
    fn from_rpc_result(result: RpcResult) -> Result<Self> {
        entries(result.result)?
            .into_iter()
            .map(User::from_value)
            .collect()
    }
}

impl FromRpcResult for GroupRecord {
    fn from_rpc_result(result: RpcResult) -> Result<Self> {
        serde_json::from_value(result.result)
            .map_err(|err| Error::ParseError(format!("Failed to decode group: {err}")))
    }
}

impl FromRpcResult for OtpToken {
    fn from_rpc_result(result: RpcResult) -> Result<Self> {
        Self::from_value(result.result)
    }
}

impl FromRpcResult for Vec<OtpToken> {
    fn from_rpc_result(result: RpcResult) -> Result<Self> {
        entries(result.result)?
            .into_iter()
            .map(OtpToken::from_value)
            .collect()
    }
}

fn entries(value: Value) -> Result<Vec<Value>> {
    match value {
        Value::Array(items) => Ok(items),
        Value::Null => Ok(Vec::new()),
        other => Err(Error::ParseError(format!(
            "expected a list of entries, found {other}"
        ))),
    }
}

/// Generates `IpaClient` methods from `name(args) -> Ret = "method" [positional] { options }`.
macro_rules! rpc_methods {
    ($(
        $(#[$meta:meta])*
        $name:ident($($arg:ident: $ty:ty),*) -> $ret:ty
            = $method:literal [$($pos:expr),*] { $($key:literal => $val:expr),* $(,)? };
    )*) => {
        impl IpaClient {
            $(
                $(#[$meta])*
                pub async fn $name(&self, $($arg: $ty),*) -> Result<$ret> {
                    let options = Options::new()$(.with($key, $val))*;
                    let result = self
                        .call($method, vec![$($pos.to_string()),*], options)
                        .await?;
                    <$ret as FromRpcResult>::from_rpc_result(result)
                }
            )*
        }
    };
}

rpc_methods! {
    /// Fetches a user with all attributes.
    user_show(uid: &str) -> User
        = "user_show" [uid] { "no_members" => false, "all" => true };

    /// Disables a user account.
    user_disable(uid: &str) -> ()
        = "user_disable" [uid] {};

    /// Enables a user account.
    user_enable(uid: &str) -> ()
        = "user_enable" [uid] {};

    /// Sets a user's password as an administrator. The new password is expired immediately.
    passwd(uid: &str, password: &str) -> ()
        = "passwd" [uid] { "password" => password };

    /// Creates a user group.
    group_add(name: &str) -> GroupRecord
        = "group_add" [name] {};

    /// Deletes a user group.
    group_del(name: &str) -> ()
        = "group_del" [name] {};

    /// Fetches a user group with its direct members.
    group_show(name: &str) -> GroupRecord
        = "group_show" [name] {
            "no_members" => false,
            "raw" => false,
            "all" => false,
            "rights" => false,
        };

    /// Adds a user to a group and returns the updated group.
    group_add_member(group: &str, uid: &str) -> GroupRecord
        = "group_add_member" [group] {
            "no_members" => false,
            "raw" => false,
            "all" => false,
            "user" => [uid],
        };

    /// Removes a user from a group.
    group_remove_member(group: &str, uid: &str) -> ()
        = "group_remove_member" [group] {
            "no_members" => false,
            "raw" => false,
            "all" => false,
            "user" => [uid],
        };

    /// Registers a host. `force` skips the DNS checks.
    host_add(fqdn: &str, ip_address: &str, force: bool) -> ()
        = "host_add" [fqdn] { "force" => force, "ip_address" => ip_address };

    /// Deletes a host.
    host_del(fqdn: &str) -> ()
        = "host_del" [fqdn] {};

    /// Creates a host group.
    hostgroup_add(name: &str) -> GroupRecord
        = "hostgroup_add" [name] {};

    /// Adds a host to a host group and returns the updated group.
    hostgroup_add_member(group: &str, host: &str) -> GroupRecord
        = "hostgroup_add_member" [group] { "all" => true, "host" => [host] };

    /// Removes a host from a host group.
    hostgroup_remove_member(group: &str, host: &str) -> ()
        = "hostgroup_remove_member" [group] { "all" => true, "host" => [host] };

    /// Deletes a host group.
    hostgroup_del(name: &str) -> ()
        = "hostgroup_del" [name] {};

    /// Creates an HBAC rule.
    hbacrule_add(name: &str) -> ()
        = "hbacrule_add" [name] {};

    /// Adds a host group to an HBAC rule.
    hbacrule_add_host(rule: &str, hostgroup: &str) -> ()
        = "hbacrule_add_host" [rule] { "hostgroup" => [hostgroup] };

    /// Adds a service group to an HBAC rule.
    hbacrule_add_service(rule: &str, service_group: &str) -> ()
        = "hbacrule_add_service" [rule] { "hbacsvcgroup" => [service_group] };

    /// Deletes an HBAC rule.
    hbacrule_del(name: &str) -> ()
        = "hbacrule_del" [name] {};

    /// Adds a user group to a sudo rule.
    sudorule_add_user(rule: &str, group: &str) -> ()
        = "sudorule_add_user" [rule] { "group" => [group] };

    /// Deletes an OTP token.
    otptoken_del(uuid: &str) -> ()
        = "otptoken_del" [uuid] {};

    /// Lists the OTP tokens owned by a user.
    otptoken_find(owner: &str) -> Vec<OtpToken>
        = "otptoken_find" [] { "ipatokenowner" => owner, "all" => true };

    /// Enables an OTP token.
    enable_otp_token(uuid: &str) -> ()
        = "otptoken_mod" [uuid] { "ipatokendisabled" => false, "all" => false };

    /// Disables an OTP token.
    disable_otp_token(uuid: &str) -> ()
        = "otptoken_mod" [uuid] { "ipatokendisabled" => true, "all" => false };
}

impl IpaClient {
    /// Searches users. `no_members` and `all` are always requested.
    ///
    /// # Errors
    ///
    /// Returns any transport or server error, or [`Error::ParseError`] for an unexpected
    /// payload.
    pub async fn user_find(&self, mut options: Options) -> Result<Vec<User>> {
        options.insert("no_members", false);
        options.insert("all", true);
        let result = self.call("user_find", vec![String::new()], options).await?;
        debug!(count = result.count.unwrap_or_default(), "user_find answered");
        Vec::<User>::from_rpc_result(result)
    }

    /// Creates a user. With `random` the server generates a password, returned in
    /// [`User::random_password`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRequest`] for an empty user name and [`Error::UserExists`] if the
    /// account already exists.
    pub async fn user_add(&self, user: &User, random: bool) -> Result<User> {
        require("username", &user.username)?;

        let mut options = user.to_options();
        if random {
            options.insert("random", true);
        }

        match self
            .call("user_add", vec![user.username.clone()], options)
            .await
        {
            Ok(result) => {
                info!(uid = %user.username, "created user");
                User::from_rpc_result(result)
            }
            Err(err) if err.is_duplicate() => Err(Error::UserExists),
            Err(err) => Err(err),
        }
    }

    /// Creates a user and sets a non-expiring password for it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRequest`] if the user name or password is empty, and any error
    /// from [`IpaClient::user_add`] or [`IpaClient::set_password`].
    pub async fn user_add_with_password(&self, user: &User, password: &str) -> Result<User> {
        require("username", &user.username)?;
        require("password", password)?;

        let record = self.user_add(user, true).await?;
        self.set_password(&record.username, &record.random_password, password, "")
            .await?;
        Ok(record)
    }

    /// Updates a user's writable attributes.
    ///
    /// When the server reports that nothing changed, `user` is returned as given.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRequest`] for an empty user name and any other server error.
    pub async fn user_mod(&self, user: &User) -> Result<User> {
        require("username", &user.username)?;

        match self
            .call("user_mod", vec![user.username.clone()], user.to_options())
            .await
        {
            Ok(result) => User::from_rpc_result(result),
            Err(err) if err.is_empty_modlist() => {
                debug!(uid = %user.username, "user_mod made no changes");
                Ok(user.clone())
            }
            Err(err) => Err(err),
        }
    }

    /// Deletes users. `preserve` moves them to the preserved container instead.
    ///
    /// # Errors
    ///
    /// Returns any transport or server error.
    pub async fn user_delete(
        &self,
        preserve: bool,
        stop_on_error: bool,
        usernames: &[&str],
    ) -> Result<()> {
        let options = Options::new()
            .with("continue", !stop_on_error)
            .with("preserve", preserve);
        let args = usernames.iter().map(ToString::to_string).collect();
        self.call("user_del", args, options).await?;
        Ok(())
    }

    /// Resets a user's password to a server-generated one and returns it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ParseError`] if the server does not return a password.
    pub async fn reset_password(&self, uid: &str) -> Result<String> {
        let options = Options::new()
            .with("no_members", false)
            .with("random", true)
            .with("all", true);
        let result = self.call("user_mod", vec![uid.to_string()], options).await?;
        let user = User::from_rpc_result(result)?;
        if user.random_password.is_empty() {
            return Err(Error::ParseError(format!(
                "no random password returned for {uid}"
            )));
        }
        Ok(user.random_password)
    }

    /// Changes a user's password through the `passwd` method. Pass an empty `otp` when the
    /// account has no OTP token.
    ///
    /// # Errors
    ///
    /// Returns any transport or server error.
    pub async fn change_password(
        &self,
        uid: &str,
        old_password: &str,
        new_password: &str,
        otp: &str,
    ) -> Result<()> {
        let mut options = Options::new()
            .with("current_password", old_password)
            .with("password", new_password);
        if !otp.is_empty() {
            options.insert("otp", otp);
        }
        self.call("passwd", vec![uid.to_string()], options).await?;
        Ok(())
    }

    /// Replaces the enabled authentication types of a user. An empty list restores the server
    /// default.
    ///
    /// # Errors
    ///
    /// Returns any transport or server error.
    pub async fn set_auth_types(&self, uid: &str, types: &[&str]) -> Result<()> {
        let options = Options::new().with("no_members", false).with("all", false);
        let options = if types.is_empty() {
            options.with("ipauserauthtype", "")
        } else {
            options.with("ipauserauthtype", types)
        };
        self.call("user_mod", vec![uid.to_string()], options).await?;
        Ok(())
    }

    /// Returns true if `uid` is a direct member of `group`.
    ///
    /// # Errors
    ///
    /// Returns any error from [`IpaClient::group_show`].
    pub async fn check_user_member_of_group(&self, uid: &str, group: &str) -> Result<bool> {
        Ok(self.group_show(group).await?.has_user(uid))
    }

    /// Returns true if a host with this name is registered.
    ///
    /// # Errors
    ///
    /// Returns any transport or server error.
    pub async fn host_exists(&self, fqdn: &str) -> Result<bool> {
        let result = self
            .call("host_find", vec![fqdn.to_string()], Options::new())
            .await?;
        Ok(!result.is_empty())
    }

    /// Creates an OTP token, filling unset parameters with the TOTP defaults.
    ///
    /// # Errors
    ///
    /// Returns any transport or server error.
    pub async fn add_otp_token(&self, token: OtpToken) -> Result<OtpToken> {
        let result = self
            .call("otptoken_add", Vec::new(), token.to_add_options())
            .await?;
        OtpToken::from_rpc_result(result)
    }

    /// Adds user groups to an HBAC rule.
    ///
    /// # Errors
    ///
    /// Returns any transport or server error.
    pub async fn hbacrule_add_user(&self, rule: &str, groups: &[&str]) -> Result<()> {
        let options = Options::new().with("all", true).with("group", groups);
        self.call("hbacrule_add_user", vec![rule.to_string()], options)
            .await?;
        Ok(())
    }

    /// Removes user groups from an HBAC rule.
    ///
    /// # Errors
    ///
    /// Returns any transport or server error.
    pub async fn hbacrule_remove_user(&self, rule: &str, groups: &[&str]) -> Result<()> {
        let options = Options::new().with("all", true).with("group", groups);
        self.call("hbacrule_remove_user", vec![rule.to_string()], options)
            .await?;
        Ok(())
    }
}

fn require(field: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(Error::InvalidRequest(format!("{field} is required")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::tests::{ok_envelope, test_config, TOKEN};
    use crate::client::PWCHANGE_RESULT_HEADER;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Match, Mock, MockServer, Request, ResponseTemplate};

    struct FirstArg(&'static str);

    impl Match for FirstArg {
        fn matches(&self, request: &Request) -> bool {
            serde_json::from_slice::<Value>(&request.body)
                .is_ok_and(|body| body["params"][0][0] == self.0)
        }
    }

    async fn mount_rpc(server: &MockServer, rpc: &str, result: Value) {
        Mock::given(method("POST"))
            .and(path("/ipa/json"))
            .and(body_partial_json(json!({ "method": rpc })))
            .respond_with(ResponseTemplate::new(200).set_body_json(ok_envelope(result)))
            .mount(server)
            .await;
    }

    async fn mount_rpc_error(server: &MockServer, rpc: &str, code: i64, message: &str) {
        Mock::given(method("POST"))
            .and(path("/ipa/json"))
            .and(body_partial_json(json!({ "method": rpc })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "error": {"code": code, "message": message, "name": "ServerError"},
                "id": 0,
                "principal": "admin@EXAMPLE.COM",
                "version": "4.9.8",
                "result": null
            })))
            .mount(server)
            .await;
    }

    /// Positional arguments and options of every RPC the server received, in order.
    async fn sent_params(server: &MockServer) -> Vec<(String, Value, Value)> {
        server
            .received_requests()
            .await
            .unwrap()
            .into_iter()
            .filter(|request| request.url.path() == "/ipa/json")
            .map(|request| {
                let body: Value = serde_json::from_slice(&request.body).unwrap();
                (
                    body["method"].as_str().unwrap().to_string(),
                    body["params"][0].clone(),
                    body["params"][1].clone(),
                )
            })
            .collect()
    }

    fn client(server: &MockServer) -> IpaClient {
        IpaClient::new(test_config(&server.uri())).unwrap()
    }

    fn user_entry(uid: &str) -> Value {
        json!({
            "dn": format!("uid={uid},cn=users,cn=accounts,dc=example,dc=com"),
            "uid": [uid],
            "givenname": ["Test"],
            "sn": ["User"],
            "memberof_group": ["ipausers"]
        })
    }

    #[tokio::test]
    async fn test_user_show() {
        let server = MockServer::start().await;
        mount_rpc(&server, "user_show", json!({"result": user_entry("jdoe"), "value": "jdoe"})).await;

        let user = client(&server).user_show("jdoe").await.unwrap();
        assert_eq!(user.username, "jdoe");
        assert!(user.has_group("ipausers"));

        let sent = sent_params(&server).await;
        assert_eq!(sent[0].1, json!(["jdoe"]));
        assert_eq!(
            sent[0].2,
            json!({"no_members": false, "all": true, "version": "2.237"})
        );
    }

    #[tokio::test]
    async fn test_user_find_forces_options() {
        let server = MockServer::start().await;
        mount_rpc(
            &server,
            "user_find",
            json!({
                "result": [user_entry("jdoe"), user_entry("asmith")],
                "count": 2,
                "truncated": false
            }),
        )
        .await;

        let users = client(&server)
            .user_find(Options::new().with("mail", "jdoe@example.com").with("all", false))
            .await
            .unwrap();
        assert_eq!(users.len(), 2);
        assert_eq!(users[1].username, "asmith");

        let sent = sent_params(&server).await;
        assert_eq!(sent[0].1, json!([""]));
        assert_eq!(sent[0].2["all"], json!(true));
        assert_eq!(sent[0].2["no_members"], json!(false));
        assert_eq!(sent[0].2["mail"], json!("jdoe@example.com"));
    }

    #[tokio::test]
    async fn test_user_add_random_password() {
        let server = MockServer::start().await;
        let mut entry = user_entry("jdoe");
        entry["randompassword"] = json!("Xy7-generated");
        mount_rpc(&server, "user_add", json!({"result": entry})).await;

        let mut user = User::new("jdoe");
        user.first_name = "Test".to_string();
        let created = client(&server).user_add(&user, true).await.unwrap();
        assert_eq!(created.random_password, "Xy7-generated");

        let sent = sent_params(&server).await;
        assert_eq!(sent[0].1, json!(["jdoe"]));
        assert_eq!(sent[0].2["random"], json!(true));
        assert_eq!(sent[0].2["givenname"], json!("Test"));
    }

    #[tokio::test]
    async fn test_user_add_existing_user() {
        let server = MockServer::start().await;
        mount_rpc_error(&server, "user_add", 4002, "user with name \"jdoe\" already exists").await;

        let err = client(&server)
            .user_add(&User::new("jdoe"), false)
            .await
            .unwrap_err();
        assert_eq!(err, Error::UserExists);
    }

    #[tokio::test]
    async fn test_user_add_requires_username() {
        let server = MockServer::start().await;
        let client = client(&server);

        let err = client.user_add(&User::default(), false).await.unwrap_err();
        assert!(matches!(err, Error::InvalidRequest(_)));

        let err = client
            .user_add_with_password(&User::new("jdoe"), "")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidRequest(_)));
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_user_add_with_password() {
        let server = MockServer::start().await;
        let mut entry = user_entry("jdoe");
        entry["randompassword"] = json!("Xy7-generated");
        mount_rpc(&server, "user_add", json!({"result": entry})).await;
        Mock::given(method("POST"))
            .and(path("/ipa/session/change_password"))
            .and(wiremock::matchers::body_string(
                "user=jdoe&otp=&old_password=Xy7-generated&new_password=Chosen%211",
            ))
            .respond_with(ResponseTemplate::new(200).insert_header(PWCHANGE_RESULT_HEADER, "ok"))
            .expect(1)
            .mount(&server)
            .await;

        let created = client(&server)
            .user_add_with_password(&User::new("jdoe"), "Chosen!1")
            .await
            .unwrap();
        assert_eq!(created.username, "jdoe");
    }

    #[tokio::test]
    async fn test_user_mod_without_changes_returns_input() {
        let server = MockServer::start().await;
        mount_rpc_error(&server, "user_mod", 4202, "no modifications to be performed").await;

        let mut user = User::new("jdoe");
        user.email = "jdoe@example.com".to_string();
        let updated = client(&server).user_mod(&user).await.unwrap();
        assert_eq!(updated, user);
    }

    #[tokio::test]
    async fn test_user_mod_other_errors_propagate() {
        let server = MockServer::start().await;
        mount_rpc_error(&server, "user_mod", 4001, "jdoe: user not found").await;

        let err = client(&server).user_mod(&User::new("jdoe")).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_user_delete() {
        let server = MockServer::start().await;
        mount_rpc(&server, "user_del", json!({"result": {"failed": []}})).await;

        client(&server)
            .user_delete(true, false, &["jdoe", "asmith"])
            .await
            .unwrap();

        let sent = sent_params(&server).await;
        assert_eq!(sent[0].1, json!(["jdoe", "asmith"]));
        assert_eq!(sent[0].2["continue"], json!(true));
        assert_eq!(sent[0].2["preserve"], json!(true));
    }

    #[tokio::test]
    async fn test_reset_password() {
        let server = MockServer::start().await;
        let mut entry = user_entry("jdoe");
        entry["randompassword"] = json!("Fresh-123");
        mount_rpc(&server, "user_mod", json!({"result": entry})).await;

        let password = client(&server).reset_password("jdoe").await.unwrap();
        assert_eq!(password, "Fresh-123");
        let sent = sent_params(&server).await;
        assert_eq!(sent[0].2["random"], json!(true));
    }

    #[tokio::test]
    async fn test_reset_password_without_password() {
        let server = MockServer::start().await;
        mount_rpc(&server, "user_mod", json!({"result": user_entry("jdoe")})).await;

        let err = client(&server).reset_password("jdoe").await.unwrap_err();
        assert!(matches!(err, Error::ParseError(_)));
    }

    #[tokio::test]
    async fn test_change_password_otp_only_when_given() {
        let server = MockServer::start().await;
        mount_rpc(&server, "passwd", json!({"result": true})).await;
        let client = client(&server);

        client.change_password("jdoe", "old", "new", "").await.unwrap();
        client
            .change_password("jdoe", "old", "new", "123456")
            .await
            .unwrap();

        let sent = sent_params(&server).await;
        assert!(sent[0].2.get("otp").is_none());
        assert_eq!(sent[0].2["current_password"], json!("old"));
        assert_eq!(sent[1].2["otp"], json!("123456"));
    }

    #[tokio::test]
    async fn test_set_auth_types() {
        let server = MockServer::start().await;
        mount_rpc(&server, "user_mod", json!({"result": user_entry("jdoe")})).await;
        let client = client(&server);

        client.set_auth_types("jdoe", &["otp"]).await.unwrap();
        client.set_auth_types("jdoe", &[]).await.unwrap();

        let sent = sent_params(&server).await;
        assert_eq!(sent[0].2["ipauserauthtype"], json!(["otp"]));
        assert_eq!(sent[0].2["all"], json!(false));
        assert_eq!(sent[1].2["ipauserauthtype"], json!(""));
    }

    #[tokio::test]
    async fn test_group_membership() {
        let server = MockServer::start().await;
        mount_rpc(
            &server,
            "group_show",
            json!({"result": {"cn": ["developers"], "member_user": ["jdoe"]}}),
        )
        .await;
        mount_rpc(&server, "group_add_member", json!({"result": {"cn": ["developers"]}})).await;
        let client = client(&server);

        assert!(client
            .check_user_member_of_group("jdoe", "developers")
            .await
            .unwrap());
        assert!(!client
            .check_user_member_of_group("asmith", "developers")
            .await
            .unwrap());

        let group = client.group_add_member("developers", "asmith").await.unwrap();
        assert_eq!(group.name(), Some("developers"));
        let sent = sent_params(&server).await;
        assert_eq!(
            sent[0].2,
            json!({
                "no_members": false,
                "raw": false,
                "all": false,
                "rights": false,
                "version": "2.237"
            })
        );
        assert_eq!(sent[2].1, json!(["developers"]));
        assert_eq!(sent[2].2["user"], json!(["asmith"]));
    }

    #[tokio::test]
    async fn test_host_exists() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/ipa/json"))
            .and(FirstArg("web1.example.com"))
            .respond_with(ResponseTemplate::new(200).set_body_json(ok_envelope(json!({
                "result": [{"fqdn": ["web1.example.com"]}],
                "count": 1
            }))))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/ipa/json"))
            .and(FirstArg("ghost.example.com"))
            .respond_with(ResponseTemplate::new(200).set_body_json(ok_envelope(json!({
                "result": [],
                "count": 0
            }))))
            .mount(&server)
            .await;
        let client = client(&server);

        assert!(client.host_exists("web1.example.com").await.unwrap());
        assert!(!client.host_exists("ghost.example.com").await.unwrap());
    }

    #[tokio::test]
    async fn test_hostgroup_add_member() {
        let server = MockServer::start().await;
        mount_rpc(
            &server,
            "hostgroup_add_member",
            json!({"result": {"cn": ["webservers"], "member_host": ["web1.example.com"]}}),
        )
        .await;

        let group = client(&server)
            .hostgroup_add_member("webservers", "web1.example.com")
            .await
            .unwrap();
        assert!(group.has_host("web1.example.com"));

        let sent = sent_params(&server).await;
        assert_eq!(sent[0].2["all"], json!(true));
        assert_eq!(sent[0].2["host"], json!(["web1.example.com"]));
    }

    #[tokio::test]
    async fn test_hbac_rule_users() {
        let server = MockServer::start().await;
        mount_rpc(&server, "hbacrule_add_user", json!({"result": {}})).await;
        mount_rpc(&server, "hbacrule_remove_user", json!({"result": {}})).await;
        let client = client(&server);

        client
            .hbacrule_add_user("allow_ssh", &["developers", "ops"])
            .await
            .unwrap();
        client
            .hbacrule_remove_user("allow_ssh", &["ops"])
            .await
            .unwrap();

        let sent = sent_params(&server).await;
        assert_eq!(sent[0].1, json!(["allow_ssh"]));
        assert_eq!(sent[0].2["group"], json!(["developers", "ops"]));
        assert_eq!(sent[1].0, "hbacrule_remove_user");
        assert_eq!(sent[1].2["group"], json!(["ops"]));
    }

    #[tokio::test]
    async fn test_otp_tokens() {
        let server = MockServer::start().await;
        mount_rpc(
            &server,
            "otptoken_find",
            json!({
                "result": [{
                    "ipatokenuniqueid": ["0f5e4c2a-0d4b-11ee-9c1f-525400a1b2c3"],
                    "ipatokenowner": ["jdoe"],
                    "type": "TOTP",
                    "ipatokenotpdigits": ["6"]
                }],
                "count": 1
            }),
        )
        .await;
        mount_rpc(&server, "otptoken_mod", json!({"result": {}})).await;
        let client = client(&server);

        let tokens = client.otptoken_find("jdoe").await.unwrap();
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].owner, "jdoe");
        assert_eq!(tokens[0].digits, 6);

        client.disable_otp_token(&tokens[0].uuid).await.unwrap();

        let sent = sent_params(&server).await;
        assert_eq!(sent[0].1, json!([]));
        assert_eq!(sent[0].2["ipatokenowner"], json!("jdoe"));
        assert_eq!(sent[1].1, json!(["0f5e4c2a-0d4b-11ee-9c1f-525400a1b2c3"]));
        assert_eq!(sent[1].2["ipatokendisabled"], json!(true));
    }

    #[tokio::test]
    async fn test_add_otp_token_defaults() {
        let server = MockServer::start().await;
        mount_rpc(
            &server,
            "otptoken_add",
            json!({
                "result": {
                    "ipatokenuniqueid": ["0f5e4c2a-0d4b-11ee-9c1f-525400a1b2c3"],
                    "uri": "otpauth://totp/jdoe@EXAMPLE.COM:0f5e4c2a?digits=6",
                    "type": "TOTP"
                },
                "value": "0f5e4c2a-0d4b-11ee-9c1f-525400a1b2c3"
            }),
        )
        .await;

        let token = client(&server)
            .add_otp_token(OtpToken::default())
            .await
            .unwrap();
        assert!(token.uri.starts_with("otpauth://totp/"));

        let sent = sent_params(&server).await;
        assert_eq!(sent[0].1, json!([]));
        assert_eq!(sent[0].2["type"], json!("totp"));
        assert_eq!(sent[0].2["ipatokenotpalgorithm"], json!("sha1"));
        assert_eq!(sent[0].2["ipatokenotpdigits"], json!(6));
        assert_eq!(sent[0].2["ipatokentotptimestep"], json!(30));
    }

    #[tokio::test]
    async fn test_unit_methods_use_session_endpoint() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/ipa/session/json"))
            .and(body_partial_json(json!({"method": "user_disable"})))
            .and(FirstArg("jdoe"))
            .respond_with(ResponseTemplate::new(200).set_body_json(ok_envelope(json!({
                "result": true,
                "value": "jdoe"
            }))))
            .expect(1)
            .mount(&server)
            .await;

        let client = IpaClient::builder(test_config(&server.uri()))
            .with_session(TOKEN)
            .build()
            .unwrap();
        client.user_disable("jdoe").await.unwrap();
    }

    #[test]
    fn test_entries_shape() {
        assert!(entries(Value::Null).unwrap().is_empty());
        assert_eq!(entries(json!([1, 2])).unwrap().len(), 2);
        assert!(matches!(
            entries(json!({"uid": "jdoe"})),
            Err(Error::ParseError(_))
        ));
    }
}
