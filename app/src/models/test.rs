use super::sensor_data::NewSensorData;
use super::settings::BrokerSettings;
use super::user::{AdminAction, AdminOutcome};
use super::*;
use uuid::Uuid;

// These run against the database in DATABASE_URL: cargo test -- --ignored

async fn test_conn() -> sqlx::PgPool {
    dotenv::dotenv().ok();
    let url = std::env::var("DATABASE_URL").unwrap();
    let conn = establish_db_connection(&url, 2).await.unwrap();
    run_migrations(&conn).await.unwrap();
    conn
}

async fn insert_profile(conn: &sqlx::PgPool) -> Uuid {
    let id = Uuid::new_v4();
    sqlx::query("INSERT INTO profiles (id, username) VALUES ($1, $2)")
        .bind(id)
        .bind(format!("user-{}", id))
        .execute(conn)
        .await
        .unwrap();
    id
}

async fn grant(conn: &sqlx::PgPool, user_id: Uuid, role: &str) {
    sqlx::query("INSERT INTO user_roles (user_id, role) VALUES ($1, $2)")
        .bind(user_id)
        .bind(role)
        .execute(conn)
        .await
        .unwrap();
}

#[tokio::test]
#[ignore]
async fn crud_sensor_data() {
    let conn = test_conn().await;

    // create
    let id = sensor_data::insert(
        &conn,
        &NewSensorData {
            temperature: Some(24.5),
            humidity: Some(0.0),
            soil_moisture: Some(41.0),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    // read
    let latest = sensor_data::get_latest(&conn, 2).await.unwrap();
    let row = latest.iter().find(|r| r.id == id).unwrap();
    assert_eq!(Some(0.0), row.humidity);
    assert_eq!(None, row.nitrogen_value);
    assert_eq!(None, row.audio_url);

    for row in sensor_data::get_npk_history(&conn, 50).await.unwrap() {
        assert!(row.nitrogen_value.is_some());
    }
}

#[tokio::test]
#[ignore]
async fn crud_settings() {
    let conn = test_conn().await;
    let user_id = insert_profile(&conn).await;
    let mut settings = BrokerSettings {
        url: "broker.local".to_owned(),
        port: 1883,
        topic: None,
        message: "pump on".to_owned(),
    };

    // insert||update
    let first = settings::upsert(&conn, user_id, &settings).await.unwrap();
    settings.message = "pump off".to_owned();
    let second = settings::upsert(&conn, user_id, &settings).await.unwrap();

    assert_eq!(first.id(), second.id());
    assert_eq!(1, settings::count(&conn, user_id).await.unwrap());
    let latest = settings::get_latest(&conn, user_id).await.unwrap().unwrap();
    assert_eq!("pump off", latest.message());
}

#[tokio::test]
#[ignore]
async fn crud_user_roles() {
    let conn = test_conn().await;
    let admin = insert_profile(&conn).await;
    let target = insert_profile(&conn).await;
    grant(&conn, admin, "admin").await;

    // non admin
    let outcome = user::apply_admin_action(
        &conn,
        target,
        "admin",
        &AdminAction::AddRole(target, "admin".to_owned()),
    )
    .await
    .unwrap();
    assert_eq!(AdminOutcome::Forbidden, outcome);

    // add twice
    for expected in [1, 0] {
        let outcome = user::apply_admin_action(
            &conn,
            admin,
            "admin",
            &AdminAction::AddRole(target, "viewer".to_owned()),
        )
        .await
        .unwrap();
        assert_eq!(AdminOutcome::Applied { rows: expected }, outcome);
    }
    let listed = user::list(&conn).await.unwrap();
    let target_roles = &listed.iter().find(|u| u.id == target).unwrap().roles;
    assert_eq!(&vec!["viewer".to_owned()], target_roles);

    // remove
    user::apply_admin_action(
        &conn,
        admin,
        "admin",
        &AdminAction::RemoveRole(target, "viewer".to_owned()),
    )
    .await
    .unwrap();
    assert!(!user::has_role(&conn, target, "viewer").await.unwrap());

    // delete
    user::apply_admin_action(&conn, admin, "admin", &AdminAction::DeleteUser(target))
        .await
        .unwrap();
    assert!(user::list(&conn)
        .await
        .unwrap()
        .iter()
        .all(|u| u.id != target));
}

#[tokio::test]
#[ignore]
async fn concurrent_add_role_inserts_once() {
    let conn = test_conn().await;
    let url = std::env::var("DATABASE_URL").unwrap();
    let wide = establish_db_connection(&url, 8).await.unwrap();
    let admin = insert_profile(&conn).await;
    grant(&conn, admin, "admin").await;
    let target = insert_profile(&conn).await;

    let action = AdminAction::AddRole(target, "viewer".to_owned());
    let outcomes = futures::future::join_all(
        (0..8).map(|_| user::apply_admin_action(&wide, admin, "admin", &action)),
    )
    .await;

    let mut inserted = 0;
    for outcome in outcomes {
        match outcome.unwrap() {
            AdminOutcome::Applied { rows } => inserted += rows,
            AdminOutcome::Forbidden => panic!("admin grant vanished"),
        }
    }
    assert_eq!(1, inserted);
    let grants: CountRecord = sqlx::query_as(
        "SELECT count(*) as count FROM user_roles WHERE user_id = $1 AND role = 'viewer'",
    )
    .bind(target)
    .fetch_one(&conn)
    .await
    .unwrap();
    assert_eq!(1, grants.count());
}
