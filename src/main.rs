fn main() -> Result<(), evently::errors::AppError> {
    evently::run()
}
