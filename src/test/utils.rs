#[cfg(test)]
pub mod test_db {
    use crate::auth::Role;
    use crate::database::{CURRENT_SCHEMA, migrate_database_declaratively};
    use crate::db::{create_child, create_session_note, create_user, get_therapist_by_user_id};
    use crate::error::AppError;
    use crate::models::NewSessionNote;
    use chrono::NaiveDate;
    use sqlx::{Pool, Sqlite, SqlitePool};
    use std::collections::HashMap;
    use std::sync::Once;
    use tracing::log::LevelFilter;

    static INIT: Once = Once::new();
    pub static STANDARD_PASSWORD: &str = "Password123";

    #[derive(Default)]
    pub struct TestDbBuilder {
        users: Vec<TestUser>,
        children: Vec<TestChild>,
        notes: Vec<TestNote>,
    }

    pub struct TestUser {
        pub email: String,
        pub role: Role,
        pub first_name: String,
        pub last_name: String,
        pub password: String,
    }

    pub struct TestChild {
        pub first_name: String,
        pub last_name: String,
        pub therapist_email: Option<String>,
    }

    pub struct TestNote {
        pub therapist_email: String,
        pub session_date: NaiveDate,
        pub note_title: Option<String>,
        pub note_content: String,
    }

    pub async fn migrated_pool() -> Result<Pool<Sqlite>, AppError> {
        INIT.call_once(|| {
            let _ = env_logger::builder()
                .filter_level(LevelFilter::Debug)
                .is_test(true)
                .try_init();
        });

        let pool = SqlitePool::connect("sqlite::memory:").await?;
        migrate_database_declaratively(pool.clone(), CURRENT_SCHEMA, false).await?;
        Ok(pool)
    }

    impl TestDbBuilder {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn therapist(mut self, email: &str, first_name: &str, last_name: &str) -> Self {
            self.users.push(TestUser {
                email: email.to_string(),
                role: Role::Therapist,
                first_name: first_name.to_string(),
                last_name: last_name.to_string(),
                password: STANDARD_PASSWORD.to_string(),
            });
            self
        }

        pub fn parent(mut self, email: &str, first_name: &str, last_name: &str) -> Self {
            self.users.push(TestUser {
                email: email.to_string(),
                role: Role::Parent,
                first_name: first_name.to_string(),
                last_name: last_name.to_string(),
                password: STANDARD_PASSWORD.to_string(),
            });
            self
        }

        pub fn user_with_password(mut self, email: &str, role: Role, password: &str) -> Self {
            self.users.push(TestUser {
                email: email.to_string(),
                role,
                first_name: "Test".to_string(),
                last_name: "User".to_string(),
                password: password.to_string(),
            });
            self
        }

        /// Adds a child; with no therapist email the child has no primary therapist.
        pub fn child(mut self, first_name: &str, last_name: &str, therapist_email: Option<&str>) -> Self {
            self.children.push(TestChild {
                first_name: first_name.to_string(),
                last_name: last_name.to_string(),
                therapist_email: therapist_email.map(String::from),
            });
            self
        }

        pub fn note(
            mut self,
            therapist_email: &str,
            session_date: &str,
            note_title: Option<&str>,
            note_content: &str,
        ) -> Self {
            let session_date = NaiveDate::parse_from_str(session_date, "%Y-%m-%d")
                .expect("Test note dates must be YYYY-MM-DD");
            self.notes.push(TestNote {
                therapist_email: therapist_email.to_string(),
                session_date,
                note_title: note_title.map(String::from),
                note_content: note_content.to_string(),
            });
            self
        }

        pub async fn build(self) -> Result<TestDb, AppError> {
            let pool = migrated_pool().await?;

            let mut user_id_map: HashMap<String, i64> = HashMap::new();
            let mut therapist_id_map: HashMap<String, i64> = HashMap::new();
            let mut child_id_map: HashMap<String, i64> = HashMap::new();

            for user in &self.users {
                let user_id = create_user(
                    &pool,
                    &crate::models::NewUser {
                        email: user.email.clone(),
                        password: user.password.clone(),
                        role: user.role,
                        first_name: user.first_name.clone(),
                        last_name: user.last_name.clone(),
                        phone: None,
                        address: None,
                        emergency_contact: None,
                    },
                )
                .await?;

                user_id_map.insert(user.email.clone(), user_id);

                if user.role == Role::Therapist {
                    let therapist = get_therapist_by_user_id(&pool, user_id).await?;
                    therapist_id_map.insert(user.email.clone(), therapist.id);
                }
            }

            for child in &self.children {
                let therapist_id = child
                    .therapist_email
                    .as_ref()
                    .and_then(|email| therapist_id_map.get(email).copied());

                let created =
                    create_child(&pool, &child.first_name, &child.last_name, None, therapist_id)
                        .await?;
                child_id_map.insert(child.first_name.clone(), created.id);
            }

            for note in &self.notes {
                let Some(therapist_id) = therapist_id_map.get(&note.therapist_email).copied()
                else {
                    continue;
                };

                create_session_note(
                    &pool,
                    therapist_id,
                    &NewSessionNote {
                        session_date: note.session_date,
                        note_content: note.note_content.clone(),
                        note_title: note.note_title.clone(),
                        session_time: None,
                    },
                )
                .await?;
            }

            Ok(TestDb {
                pool,
                user_id_map,
                therapist_id_map,
                child_id_map,
            })
        }
    }

    pub struct TestDb {
        pub pool: Pool<Sqlite>,
        pub user_id_map: HashMap<String, i64>,
        pub therapist_id_map: HashMap<String, i64>,
        pub child_id_map: HashMap<String, i64>,
    }

    impl TestDb {
        pub fn user_id(&self, email: &str) -> Option<i64> {
            self.user_id_map.get(email).copied()
        }

        pub fn therapist_id(&self, email: &str) -> Option<i64> {
            self.therapist_id_map.get(email).copied()
        }

        pub fn child_id(&self, first_name: &str) -> Option<i64> {
            self.child_id_map.get(first_name).copied()
        }

        /// Pushes a row's timestamp column into the past so a later refresh is observable.
        pub async fn backdate(&self, table: &str, column: &str, key: &str, id: i64) {
            sqlx::query(&format!(
                "UPDATE {} SET {} = '2000-01-01 00:00:00' WHERE {} = ?",
                table, column, key
            ))
            .bind(id)
            .execute(&self.pool)
            .await
            .expect("Failed to backdate row");
        }
    }
}

#[cfg(test)]
pub mod test_client {
    use super::test_db::TestDb;
    use crate::env::AppConfig;
    use crate::init_rocket;
    use rocket::http::{ContentType, Status};
    use rocket::local::asynchronous::Client;
    use serde_json::json;

    /// Tracked client, so the session cookie set by `/api/login` rides along.
    pub async fn setup_test_client(test_db: &TestDb) -> Client {
        setup_test_client_with_config(test_db, AppConfig::default()).await
    }

    pub async fn setup_test_client_with_config(test_db: &TestDb, config: AppConfig) -> Client {
        let rocket = init_rocket(test_db.pool.clone(), config);
        Client::tracked(rocket)
            .await
            .expect("Failed to build Rocket client")
    }

    pub async fn login_test_user(client: &Client, email: &str, password: &str) {
        let response = client
            .post("/api/login")
            .header(ContentType::JSON)
            .body(json!({ "email": email, "password": password }).to_string())
            .dispatch()
            .await;

        assert_eq!(response.status(), Status::Ok);

        let body: serde_json::Value = response
            .into_json()
            .await
            .expect("Login response was not JSON");
        assert_eq!(body["success"], true, "Login failed for {}", email);
    }
}
