use rust_decimal::Decimal;
use uuid::Uuid;
use yuancity_api::{config::AppConfig, db::create_pool};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;

    let pool = create_pool(&config.database_url).await?;
    // Ensure migrations are applied.
    sqlx::migrate!("./migrations").run(&pool).await?;

    let buyer_id = ensure_user(&pool, "cliente@example.com", "Camila Rojas", "client").await?;
    let vendor_a = ensure_user(&pool, "artesanias@example.com", "Artesanías del Valle", "vendor").await?;
    let vendor_b = ensure_user(&pool, "cafetera@example.com", "Cafetera Andina", "vendor").await?;
    ensure_user(&pool, "admin@example.com", "Plataforma YuanCity", "admin").await?;

    seed_products(&pool, vendor_a, vendor_b).await?;
    seed_coupons(&pool).await?;

    println!("Seed completed. Buyer ID: {buyer_id}");
    Ok(())
}

async fn ensure_user(
    pool: &sqlx::PgPool,
    email: &str,
    full_name: &str,
    role: &str,
) -> anyhow::Result<Uuid> {
    let (id,): (Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO users (id, email, full_name, role)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (email) DO UPDATE SET full_name = EXCLUDED.full_name, role = EXCLUDED.role
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(email)
    .bind(full_name)
    .bind(role)
    .fetch_one(pool)
    .await?;

    println!("Ensured user {email} (role={role})");
    Ok(id)
}

async fn seed_products(
    pool: &sqlx::PgPool,
    vendor_a: Uuid,
    vendor_b: Uuid,
) -> anyhow::Result<()> {
    let products = vec![
        (vendor_a, "Mochila Wayuu", "Tejida a mano, colores tradicionales", 185000, 10, 40),
        (vendor_a, "Sombrero Vueltiao", "Caña flecha trenzada, talla única", 95000, 0, 25),
        (vendor_b, "Café de origen 500g", "Tostión media, notas de panela", 38000, 20, 200),
        (vendor_b, "Prensa francesa", "Vidrio borosilicato, 600ml", 72000, 0, 60),
    ];

    for (vendor_id, name, desc, price, discount, stock) in products {
        sqlx::query(
            r#"
            INSERT INTO products (id, vendor_id, name, description, price, discount_percent, stock)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (vendor_id, name) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(vendor_id)
        .bind(name)
        .bind(desc)
        .bind(Decimal::from(price))
        .bind(discount)
        .bind(stock)
        .execute(pool)
        .await?;
    }

    println!("Seeded products");
    Ok(())
}

async fn seed_coupons(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO percentage_coupons (id, name, discount_percentage)
        VALUES ($1, 'SALE20', 20)
        ON CONFLICT (name) DO NOTHING
        "#,
    )
    .bind(Uuid::new_v4())
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        INSERT INTO fixed_price_coupons (id, name, discount_price)
        VALUES ($1, 'BIENVENIDA10K', 10000)
        ON CONFLICT (name) DO NOTHING
        "#,
    )
    .bind(Uuid::new_v4())
    .execute(pool)
    .await?;

    println!("Seeded coupons");
    Ok(())
}
