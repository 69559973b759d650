//! 商城命令行客户端

use clap::{Parser, Subcommand};
use commerce_core::client::{filter_by_category, order_total, total_revenue, DEFAULT_TOP_N};
use commerce_core::{
    ClientConfig, Error, FileStore, Product, ProductFilter, ReviewDraft, ReviewEdit, Role, ShopClient,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "commerce")]
#[command(about = "商城客户端工具", long_about = None)]
struct Cli {
    /// 服务器地址
    #[arg(short, long, env = "COMMERCE_API_URL", default_value = "http://localhost:8080")]
    server: String,

    /// 请求超时（毫秒）
    #[arg(long, env = "COMMERCE_API_TIMEOUT_MS", default_value_t = 5000)]
    timeout_ms: u64,

    /// 会话文件（.token / .user）所在目录
    #[arg(long, default_value = ".")]
    session_dir: PathBuf,

    /// 跳过 TLS 证书验证
    #[arg(long)]
    insecure: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 用户注册
    Signup {
        #[arg(short, long)]
        email: String,
        #[arg(short, long)]
        password: String,
        #[arg(short, long)]
        name: String,
        /// CUSTOMER 或 SELLER
        #[arg(short, long, default_value = "CUSTOMER")]
        role: Role,
    },
    /// 用户登录
    Login {
        #[arg(short, long)]
        email: String,
        #[arg(short, long)]
        password: String,
    },
    /// 用户登出
    Logout,
    /// 显示当前会话
    Whoami,
    /// 打开视图路径，显示守卫求值后的结果
    Open {
        path: String,
    },
    /// 商品列表
    Products {
        #[arg(short, long)]
        category: Option<String>,
        #[arg(short, long)]
        name: Option<String>,
    },
    /// 商品详情
    Product {
        id: i64,
    },
    /// 人气商品
    Popular,
    /// 趋势商品
    Trending,
    /// 个性化推荐
    Recommend {
        #[arg(short = 'n', long, default_value_t = DEFAULT_TOP_N)]
        top_n: u32,
    },
    /// 下单
    Order {
        product_id: i64,
        #[arg(short, long, default_value_t = 1)]
        quantity: u32,
    },
    /// 我的订单
    Orders,
    /// 取消订单
    Cancel {
        order_id: i64,
    },
    /// 评论列表
    Reviews {
        #[arg(short, long)]
        product_id: Option<i64>,
    },
    /// 发表评论
    Review {
        #[arg(long)]
        product_id: i64,
        #[arg(long)]
        order_id: i64,
        #[arg(short, long)]
        content: String,
        #[arg(short, long, default_value_t = 5)]
        rating: u8,
    },
    /// 修改评论
    EditReview {
        review_id: i64,
        #[arg(short, long)]
        content: String,
        #[arg(short, long, default_value_t = 5)]
        rating: u8,
    },
    /// 删除评论
    DeleteReview {
        review_id: i64,
    },
    /// 销售统计（卖家）
    Sales,
    /// 健康检查
    Health,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_logging();

    let cli = Cli::parse();

    let config = ClientConfig {
        server_url: cli.server.clone(),
        timeout_ms: cli.timeout_ms,
        verify_tls: !cli.insecure,
    };
    debug!("Using backend {} (timeout {} ms)", config.server_url, config.timeout_ms);
    let store = Arc::new(FileStore::new(cli.session_dir.clone()));
    let client = ShopClient::new(config, store)?;

    let result = run(&client, cli.command).await;
    match &result {
        Err(Error::Unauthorized) => println!("会话已失效，请重新登录"),
        Err(Error::AlreadyAuthenticated) => println!("已登录，请先登出"),
        _ => {}
    }
    result?;

    Ok(())
}

fn init_logging() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

async fn run(client: &ShopClient, command: Commands) -> commerce_core::Result<()> {
    match command {
        Commands::Signup {
            email,
            password,
            name,
            role,
        } => {
            println!("正在注册用户: {}", email);
            let user = client.signup(&email, &password, &name, role).await?;
            println!("注册成功! 用户ID: {}", user.user_id);
        }
        Commands::Login { email, password } => {
            println!("正在登录用户: {}", email);
            let user = client.login(&email, &password).await?;
            println!("登录成功! 欢迎, {}", user.name);
        }
        Commands::Logout => {
            client.logout().await?;
            println!("登出成功!");
        }
        Commands::Whoami => match client.gate().user().await {
            Some(user) => {
                let role = user.role.map(|r| r.to_string()).unwrap_or_else(|| "-".to_string());
                println!("{} <{}> (ID: {}, 角色: {})", user.name, user.email, user.user_id, role);
            }
            None if client.gate().is_authenticated().await => println!("已登录（无用户信息）"),
            None => println!("未登录"),
        },
        Commands::Open { path } => {
            let route = client.navigator().open(&path).await;
            println!("{}", route);
        }
        Commands::Products { category, name } => {
            let filter = ProductFilter {
                category: category.clone(),
                name,
            };
            let products = client.products(&filter).await?;
            // 后端忽略分类参数时仍在本地过滤
            let products = match category.as_deref() {
                Some(c) => filter_by_category(&products, c).into_iter().cloned().collect(),
                None => products,
            };
            print_products(&products);
        }
        Commands::Product { id } => {
            let product = client.product(id).await?;
            print_products(std::slice::from_ref(&product));
            if let Some(description) = &product.description {
                println!("  {}", description);
            }
        }
        Commands::Popular => print_products(&client.popular_products().await?),
        Commands::Trending => print_products(&client.trending_products().await?),
        Commands::Recommend { top_n } => {
            let products = client.recommendations_or_default(top_n).await;
            if products.is_empty() {
                println!("暂无推荐商品");
            } else {
                print_products(&products);
            }
        }
        Commands::Order { product_id, quantity } => {
            let order = client.place_order(product_id, quantity).await?;
            println!("下单成功! 订单ID: {}，金额: {}", order.id, order.total_price);
        }
        Commands::Orders => {
            let orders = client.my_orders().await?;
            for order in &orders {
                println!(
                    "#{} {} x{} {} {} {}",
                    order.id,
                    order.product_name.as_deref().unwrap_or("(已删除商品)"),
                    order.quantity,
                    order.total_price,
                    order.status.as_deref().unwrap_or("-"),
                    order.order_date.as_deref().unwrap_or("-"),
                );
            }
            println!("共 {} 笔订单，总金额: {}", orders.len(), order_total(&orders));
        }
        Commands::Cancel { order_id } => {
            client.cancel_order(order_id).await?;
            println!("订单已取消");
        }
        Commands::Reviews { product_id } => {
            let reviews = match product_id {
                Some(id) => client.product_reviews(id).await?,
                None => client.reviews().await?,
            };
            for review in &reviews {
                println!(
                    "#{} [{}] {} {}★ {}",
                    review.id,
                    review.product_name.as_deref().unwrap_or("-"),
                    review.user_name.as_deref().unwrap_or("-"),
                    review.rating,
                    review.content,
                );
            }
        }
        Commands::Review {
            product_id,
            order_id,
            content,
            rating,
        } => {
            let draft = ReviewDraft {
                product_id,
                order_id: Some(order_id),
                content,
                rating,
            };
            let review = client.create_review(&draft).await?;
            println!("评论已发表，ID: {}", review.id);
        }
        Commands::EditReview {
            review_id,
            content,
            rating,
        } => {
            client.update_review(review_id, &ReviewEdit { content, rating }).await?;
            println!("评论已修改");
        }
        Commands::DeleteReview { review_id } => {
            client.delete_review(review_id).await?;
            println!("评论已删除");
        }
        Commands::Sales => {
            let stats = client.sales_stats().await?;
            for stat in &stats {
                let rating = stat
                    .average_rating
                    .map(|r| format!("{:.1}", r))
                    .unwrap_or_else(|| "-".to_string());
                println!(
                    "{}: 数量 {}, 销售额 {}, 平均评分 {}",
                    stat.product_name, stat.total_quantity, stat.total_sales, rating
                );
            }
            println!("总销售额: {}", total_revenue(&stats));
        }
        Commands::Health => {
            if client.health_check().await? {
                println!("服务状态: 正常");
            } else {
                println!("服务状态: 异常");
            }
        }
    }

    Ok(())
}

fn print_products(products: &[Product]) {
    for p in products {
        let rating = match (p.average_rating, p.rating_count) {
            (Some(avg), Some(count)) => format!("{:.1}★ ({})", avg, count),
            (Some(avg), None) => format!("{:.1}★", avg),
            _ => "-".to_string(),
        };
        println!(
            "#{} {} [{}] {} {}",
            p.id,
            p.name,
            p.category.as_deref().unwrap_or("-"),
            p.price.map(|v| v.to_string()).unwrap_or_else(|| "-".to_string()),
            rating
        );
    }
}
