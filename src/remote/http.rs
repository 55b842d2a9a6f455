use serde::Deserialize;
use serde_json::{Value, json};

use crate::config::SystemConfig;
use crate::error::{Error, Result};
use crate::types::{CollectionInfo, Column, Kind, Row, RoleUpdate};

use super::auth::AuthResponse;
use super::http_client::HttpClient;
use super::{Login, Page, Query, Remote, SystemCreated, SystemInfo, Table, string_field};

/// [`Remote`] over the platform's REST API for one system.
pub struct HttpRemote {
    client: HttpClient,
}

#[derive(Debug, Deserialize)]
struct CountResponse {
    #[serde(alias = "COUNT", alias = "count", default)]
    count: u64,
}

impl HttpRemote {
    pub fn new(system: &SystemConfig, max_retries: u32) -> Result<Self> {
        let client = HttpClient::new(
            &system.platform_url,
            &system.system_key,
            &system.system_secret,
            max_retries,
        )?;
        Ok(Self { client })
    }

    /// A client not yet bound to a system, for logging in and creating one.
    pub fn unbound(platform_url: &str, max_retries: u32) -> Result<Self> {
        Ok(Self {
            client: HttpClient::new(platform_url, "", "", max_retries)?,
        })
    }

    fn key(&self) -> &str {
        self.client.system_key()
    }

    fn kind_root(&self, kind: Kind) -> Result<String> {
        let key = self.key();
        let root = match kind {
            Kind::Service => format!("/codeadmin/v/2/{key}"),
            Kind::Library => format!("/codeadmin/v/2/library/{key}"),
            Kind::Trigger => format!("/admin/triggers/handlers/{key}"),
            Kind::Timer => format!("/admin/triggers/timers/{key}"),
            Kind::Edge => format!("/admin/edges/{key}"),
            Kind::Device => format!("/admin/devices/{key}"),
            Kind::Portal => format!("/admin/portals/{key}"),
            Kind::Plugin => format!("/admin/plugins/{key}"),
            Kind::Adapter => format!("/admin/adaptors/{key}"),
            Kind::Deployment => format!("/admin/{key}/deployments"),
            Kind::Collection | Kind::Role | Kind::User => {
                return Err(Error::Config(format!("{kind} is addressed by ID, not by name")));
            }
        };
        Ok(root)
    }

    fn kind_item(&self, kind: Kind, name: &str) -> Result<String> {
        Ok(format!("{}/{}", self.kind_root(kind)?, encode(name)))
    }

    fn columns_path(&self, table: Table<'_>) -> String {
        let key = self.key();
        match table {
            Table::Collection(id) => format!("/api/v/1/collection/{}/columns", encode(id)),
            Table::Users => format!("/admin/user/{key}/columns"),
            Table::Devices => format!("/admin/devices/{key}/columns"),
            Table::Edges => format!("/admin/edges/{key}/columns"),
        }
    }
}

fn encode(segment: &str) -> String {
    urlencoding::encode(segment).into_owned()
}

/// Lists come back either bare or wrapped in a single-array object.
fn into_list(value: Value) -> Result<Vec<Value>> {
    match value {
        Value::Array(items) => Ok(items),
        Value::Null => Ok(Vec::new()),
        Value::Object(map) => {
            let mut found = None;
            for (_, v) in map {
                if let Value::Array(items) = v {
                    found = Some(items);
                    break;
                }
            }
            found.ok_or_else(|| Error::Protocol("expected a list in response".into()))
        }
        other => Err(Error::Protocol(format!("expected a list, got {other}"))),
    }
}

fn names_of(items: Vec<Value>) -> Vec<String> {
    items
        .into_iter()
        .filter_map(|item| match item {
            Value::String(name) => Some(name),
            other => string_field(&other, &["name", "Name"]),
        })
        .collect()
}

fn column_from(value: &Value) -> Option<Column> {
    let name = string_field(value, &["ColumnName", "column_name", "name"])?;
    let column_type = string_field(value, &["ColumnType", "type", "column_type"]).unwrap_or_default();
    let primary_key = value.get("PK").and_then(Value::as_bool).unwrap_or(false);
    Some(Column {
        name,
        column_type,
        primary_key,
    })
}

impl Remote for HttpRemote {
    fn set_token(&mut self, token: &str) {
        self.client.set_token(token);
    }

    fn authenticate(&mut self, email: &str, password: &str) -> Result<Login> {
        let resp: AuthResponse = self
            .client
            .post("/admin/auth", &json!({"email": email, "password": password}))?;
        resp.into_login()
    }

    fn verify_two_factor(&mut self, email: &str, otp_id: &str, code: &str) -> Result<String> {
        let resp: AuthResponse = self.client.post(
            "/admin/auth/verify",
            &json!({"email": email, "otp_id": otp_id, "otp_value": code}),
        )?;
        match resp.into_login()? {
            Login::Token(token) => Ok(token),
            Login::TwoFactor { .. } => Err(Error::AuthFailure("two-factor code rejected".into())),
        }
    }

    fn system_info(&mut self) -> Result<SystemInfo> {
        let path = format!("/admin/systemmanagement?id={}", encode(self.key()));
        self.client.get(&path)
    }

    fn create_system(&mut self, name: &str, description: &str) -> Result<SystemCreated> {
        self.client.post(
            "/admin/systemmanagement",
            &json!({"name": name, "description": description}),
        )
    }

    fn names(&mut self, kind: Kind) -> Result<Vec<String>> {
        let list: Value = self.client.get(&self.kind_root(kind)?)?;
        Ok(names_of(into_list(list)?))
    }

    fn get(&mut self, kind: Kind, name: &str) -> Result<Value> {
        self.client.get(&self.kind_item(kind, name)?)
    }

    fn create(&mut self, kind: Kind, name: &str, body: &Value) -> Result<()> {
        let _: Value = self.client.post(&self.kind_item(kind, name)?, body)?;
        Ok(())
    }

    fn update(&mut self, kind: Kind, name: &str, body: &Value) -> Result<()> {
        let _: Value = self.client.put(&self.kind_item(kind, name)?, body)?;
        Ok(())
    }

    fn delete(&mut self, kind: Kind, name: &str) -> Result<()> {
        self.client.delete(&self.kind_item(kind, name)?)
    }

    fn columns(&mut self, table: Table<'_>) -> Result<Vec<Column>> {
        let list: Value = self.client.get(&self.columns_path(table))?;
        Ok(into_list(list)?.iter().filter_map(column_from).collect())
    }

    fn add_column(&mut self, table: Table<'_>, column: &Column) -> Result<()> {
        let _: Value = match table {
            Table::Collection(id) => self.client.put(
                "/admin/collectionmanagement",
                &json!({"id": id, "addColumn": {"name": column.name, "type": column.column_type}}),
            )?,
            _ => self.client.post(
                &self.columns_path(table),
                &json!({"column_name": column.name, "type": column.column_type}),
            )?,
        };
        Ok(())
    }

    fn delete_column(&mut self, table: Table<'_>, name: &str) -> Result<()> {
        match table {
            Table::Collection(id) => {
                let _: Value = self.client.put(
                    "/admin/collectionmanagement",
                    &json!({"id": id, "deleteColumn": name}),
                )?;
                Ok(())
            }
            _ => self
                .client
                .delete(&format!("{}?column={}", self.columns_path(table), encode(name))),
        }
    }

    fn collections(&mut self) -> Result<Vec<CollectionInfo>> {
        let list: Value = self
            .client
            .get(&format!("/admin/allcollections?appid={}", encode(self.key())))?;
        into_list(list)?
            .into_iter()
            .map(|v| serde_json::from_value(v).map_err(|e| Error::Protocol(e.to_string())))
            .collect()
    }

    fn create_collection(&mut self, name: &str) -> Result<String> {
        let resp: Value = self.client.post(
            "/admin/collectionmanagement",
            &json!({"appID": self.key(), "name": name}),
        )?;
        string_field(&resp, &["collectionID", "collection_id", "id"])
            .ok_or_else(|| Error::Protocol(format!("no ID returned for collection '{name}'")))
    }

    fn delete_collection(&mut self, id: &str) -> Result<()> {
        self.client
            .delete(&format!("/admin/collectionmanagement?id={}", encode(id)))
    }

    fn rows(&mut self, id: &str, query: &Query) -> Result<Page> {
        let wire = query.to_wire().to_string();
        self.client.get(&format!(
            "/api/v/1/data/{}?query={}",
            encode(id),
            encode(&wire)
        ))
    }

    fn count(&mut self, id: &str) -> Result<u64> {
        let resp: CountResponse = self.client.get(&format!("/api/v/1/data/{}/count", encode(id)))?;
        Ok(resp.count)
    }

    fn create_rows(&mut self, id: &str, rows: &[Row]) -> Result<()> {
        let _: Value = self.client.post(&format!("/api/v/1/data/{}", encode(id)), rows)?;
        Ok(())
    }

    fn update_rows(&mut self, id: &str, query: &Query, changes: &Row) -> Result<u64> {
        let body = json!({"query": query.to_wire()["FILTERS"], "$set": changes});
        let resp: CountResponse = self.client.put(&format!("/api/v/1/data/{}", encode(id)), &body)?;
        Ok(resp.count)
    }

    fn users(&mut self) -> Result<Vec<Value>> {
        let list: Value = self.client.get(&format!("/admin/user/{}", self.key()))?;
        into_list(list)
    }

    fn create_user(&mut self, email: &str, password: &str) -> Result<String> {
        let resp: Value = self.client.post(
            &format!("/admin/user/{}", self.key()),
            &json!({"email": email, "password": password}),
        )?;
        string_field(&resp, &["user_id"])
            .ok_or_else(|| Error::Protocol(format!("no ID returned for user '{email}'")))
    }

    fn update_user(&mut self, id: &str, changes: &Row) -> Result<()> {
        let _: Value = self.client.put(
            &format!("/admin/user/{}", self.key()),
            &json!({"user": id, "changes": changes}),
        )?;
        Ok(())
    }

    fn delete_user(&mut self, id: &str) -> Result<()> {
        self.client
            .delete(&format!("/admin/user/{}?user={}", self.key(), encode(id)))
    }

    fn user_roles(&mut self, id: &str) -> Result<Vec<String>> {
        let list: Value = self.client.get(&format!(
            "/admin/user/{}/roles?user={}",
            self.key(),
            encode(id)
        ))?;
        Ok(names_of(into_list(list)?))
    }

    fn set_user_roles(&mut self, id: &str, add: &[String], remove: &[String]) -> Result<()> {
        let _: Value = self.client.put(
            &format!("/admin/user/{}", self.key()),
            &json!({"user": id, "changes": {"roles": {"add": add, "delete": remove}}}),
        )?;
        Ok(())
    }

    fn roles(&mut self) -> Result<Vec<Value>> {
        let list: Value = self.client.get(&format!("/admin/user/{}/roles", self.key()))?;
        into_list(list)
    }

    fn create_role(&mut self, name: &str, description: Option<&str>) -> Result<String> {
        let resp: Value = self.client.post(
            &format!("/admin/user/{}/roles", self.key()),
            &json!({"name": name, "description": description.unwrap_or_default()}),
        )?;
        match resp {
            Value::String(id) => Ok(id),
            other => string_field(&other, &["role_id", "ID", "id"])
                .ok_or_else(|| Error::Protocol(format!("no ID returned for role '{name}'"))),
        }
    }

    fn update_role(&mut self, update: &RoleUpdate) -> Result<()> {
        let _: Value = self
            .client
            .put(&format!("/admin/user/{}/roles", self.key()), update)?;
        Ok(())
    }

    fn delete_role(&mut self, id: &str) -> Result<()> {
        self.client
            .delete(&format!("/admin/user/{}/roles?id={}", self.key(), encode(id)))
    }

    fn adapter_files(&mut self, adapter: &str) -> Result<Vec<String>> {
        let path = format!("{}/files", self.kind_item(Kind::Adapter, adapter)?);
        let list: Value = self.client.get(&path)?;
        Ok(names_of(into_list(list)?))
    }

    fn get_adapter_file(&mut self, adapter: &str, file: &str) -> Result<Value> {
        let path = format!("{}/files/{}", self.kind_item(Kind::Adapter, adapter)?, encode(file));
        self.client.get(&path)
    }

    fn create_adapter_file(&mut self, adapter: &str, body: &Value) -> Result<()> {
        let path = format!("{}/files", self.kind_item(Kind::Adapter, adapter)?);
        let _: Value = self.client.post(&path, body)?;
        Ok(())
    }

    fn update_adapter_file(&mut self, adapter: &str, file: &str, body: &Value) -> Result<()> {
        let path = format!("{}/files/{}", self.kind_item(Kind::Adapter, adapter)?, encode(file));
        let _: Value = self.client.put(&path, body)?;
        Ok(())
    }

    fn execute_service(&mut self, name: &str, params: &Value) -> Result<Value> {
        self.client
            .post(&format!("/api/v/1/code/{}/{}", self.key(), encode(name)), params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_into_list_accepts_wrapped_and_bare() {
        assert_eq!(into_list(json!([1, 2])).unwrap().len(), 2);
        assert_eq!(into_list(json!({"services": ["a"]})).unwrap(), vec![json!("a")]);
        assert!(into_list(json!(null)).unwrap().is_empty());
        assert!(into_list(json!({"count": 1})).is_err());
    }

    #[test]
    fn test_names_of_strings_and_objects() {
        let names = names_of(vec![json!("a"), json!({"name": "b"}), json!({"Name": "c"}), json!(3)]);
        assert_eq!(names, ["a", "b", "c"]);
    }

    #[test]
    fn test_column_from_platform_shapes() {
        let col = column_from(&json!({"ColumnName": "foo", "ColumnType": "string"})).unwrap();
        assert_eq!(col, Column::new("foo", "string"));
        let col = column_from(&json!({"column_name": "bar", "type": "int"})).unwrap();
        assert_eq!(col, Column::new("bar", "int"));
        assert!(column_from(&json!({"type": "int"})).is_none());
    }

    #[test]
    fn test_kind_paths() {
        let system = SystemConfig {
            platform_url: "https://p.example.com".into(),
            system_key: "KEY".into(),
            ..SystemConfig::default()
        };
        let remote = HttpRemote::new(&system, 0).unwrap();
        assert_eq!(remote.kind_item(Kind::Service, "my svc").unwrap(), "/codeadmin/v/2/KEY/my%20svc");
        assert_eq!(remote.kind_root(Kind::Deployment).unwrap(), "/admin/KEY/deployments");
        assert!(remote.kind_root(Kind::Role).is_err());
        assert_eq!(remote.columns_path(Table::Users), "/admin/user/KEY/columns");
    }
}
