use utoipa::openapi::{InfoBuilder, OpenApi, OpenApiBuilder, Paths};

/// Minimal OpenAPI specification for the Discovery Feed Engine.
pub fn doc() -> OpenApi {
    OpenApiBuilder::new()
        .info(
            InfoBuilder::new()
                .title("Causeway Feed Service API")
                .version("1.0.0")
                .description(Some(
                    "Personalized discovery feed, interaction tracking and profile \
                     inspection endpoints for the Causeway platform.",
                ))
                .build(),
        )
        .paths(Paths::new())
        .build()
}
