use clap::{Args, Parser, Subcommand};
use core::time::Duration;
use quartet_client::Driver;
use quartet_core::{proto::Greeting, types::Entity};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Drives the quartet services from the command line.
#[derive(Parser, Debug)]
#[command(
    name = "quartet-client",
    version,
    about = "Issue unary, streaming and bidirectional calls against a quartet server"
)]
struct Cli {
    /// Server endpoint.
    ///
    /// Environment variable: `QUARTET_ENDPOINT`
    #[arg(long, env = "QUARTET_ENDPOINT", default_value_t = String::from("http://127.0.0.1:50051"))]
    endpoint: String,

    /// Delay between consecutive streamed requests, in milliseconds.
    #[arg(long, default_value_t = 1000)]
    interval_ms: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Unary greeting.
    Greet(Person),
    /// Server-streamed greetings for one person.
    GreetManyTimes(Person),
    /// One concatenated greeting for everyone, sent after the last name.
    LongGreet(People),
    /// One greeting back per name, while names are still being sent.
    GreetEveryone(People),
    /// Adds two numbers.
    Sum {
        #[arg(allow_negative_numbers = true)]
        first: i64,
        #[arg(allow_negative_numbers = true)]
        second: i64,
    },
    /// Streams numbers and prints each new running maximum.
    Max {
        #[arg(allow_negative_numbers = true, required = true)]
        numbers: Vec<i64>,
    },
    /// Streams numbers and prints their mean.
    Average {
        #[arg(allow_negative_numbers = true)]
        numbers: Vec<i64>,
    },
    /// Prints the prime factors of a number as they are streamed.
    Factors {
        #[arg(allow_negative_numbers = true)]
        number: i64,
    },
    /// Blog CRUD.
    #[command(subcommand)]
    Blog(BlogCommand),
}

#[derive(Args, Debug)]
struct Person {
    first_name: String,
    #[arg(long, default_value_t = String::new())]
    last_name: String,
}

#[derive(Args, Debug)]
struct People {
    first_names: Vec<String>,
}

#[derive(Args, Debug)]
struct BlogFields {
    #[arg(long)]
    author_id: String,
    #[arg(long)]
    title: String,
    #[arg(long)]
    content: String,
}

#[derive(Subcommand, Debug)]
enum BlogCommand {
    Create(BlogFields),
    Read { blog_id: String },
    Update {
        blog_id: String,
        #[command(flatten)]
        fields: BlogFields,
    },
    Delete { blog_id: String },
}

fn greeting(first_name: String, last_name: String) -> Greeting {
    Greeting {
        first_name,
        last_name,
    }
}

fn entity(fields: BlogFields) -> Entity {
    Entity::new(fields.author_id, fields.title, fields.content)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339()),
        )
        .try_init()?;

    let driver = Driver::connect(cli.endpoint)
        .await?
        .with_interval(Duration::from_millis(cli.interval_ms));

    match cli.command {
        Command::Greet(p) => {
            let reply = driver.greet(greeting(p.first_name, p.last_name)).await?;
            println!("{reply}");
        }
        Command::GreetManyTimes(p) => {
            driver
                .greet_many_times_each(greeting(p.first_name, p.last_name), |line| {
                    println!("{line}");
                })
                .await?;
        }
        Command::LongGreet(people) => {
            let greetings = people
                .first_names
                .into_iter()
                .map(|name| greeting(name, String::new()))
                .collect();
            println!("{}", driver.long_greet(greetings).await?);
        }
        Command::GreetEveryone(people) => {
            let greetings = people
                .first_names
                .into_iter()
                .map(|name| greeting(name, String::new()))
                .collect();
            driver
                .greet_everyone_each(greetings, |line| println!("{line}"))
                .await?;
        }
        Command::Sum { first, second } => println!("{}", driver.sum(first, second).await?),
        Command::Max { numbers } => {
            driver
                .find_maximum_each(numbers, |maximum| println!("{maximum}"))
                .await?;
        }
        Command::Average { numbers } => println!("{}", driver.compute_average(numbers).await?),
        Command::Factors { number } => {
            driver
                .decompose_factors_each(number, |factor| println!("{factor}"))
                .await?;
        }
        Command::Blog(command) => match command {
            BlogCommand::Create(fields) => {
                println!("{:#?}", driver.create_blog(entity(fields)).await?);
            }
            BlogCommand::Read { blog_id } => println!("{:#?}", driver.read_blog(blog_id).await?),
            BlogCommand::Update { blog_id, fields } => {
                let updated = driver.update_blog(entity(fields).with_id(blog_id)).await?;
                println!("{updated:#?}");
            }
            BlogCommand::Delete { blog_id } => {
                println!("deleted {}", driver.delete_blog(blog_id).await?);
            }
        },
    }

    Ok(())
}
