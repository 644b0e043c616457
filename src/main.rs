#[rocket::main]
async fn main() {
    if let Err(e) = chatlens::rocket().launch().await {
        eprintln!("🔥 Server failed to launch: {e}");
        std::process::exit(1);
    }
}
