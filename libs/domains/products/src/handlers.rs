use axum::{
    Json, Router,
    extract::{OriginalUri, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use axum_extra::extract::WithRejection;
use axum_helpers::{
    AppError, IdPath, OptionalJson, ValidatedQuery,
    errors::responses::{
        BadRequestIdResponse, BadRequestValidationResponse, ConflictResponse,
        InternalServerErrorResponse,
    },
};
use std::sync::Arc;
use utoipa::OpenApi;

use crate::error::ProductResult;
use crate::models::{Page, PageRequest, Product};
use crate::repository::ProductRepository;
use crate::service::ProductService;

pub const TAG: &str = "products";

/// OpenAPI documentation for Products API
#[derive(OpenApi)]
#[openapi(
    paths(
        list_products,
        list_products_paged,
        get_product,
        create_product,
        update_product,
        delete_product,
    ),
    components(
        schemas(Product, PageRequest, Page<Product>),
        responses(
            BadRequestValidationResponse,
            BadRequestIdResponse,
            ConflictResponse,
            InternalServerErrorResponse
        )
    ),
    tags(
        (name = TAG, description = "Product catalogue endpoints")
    )
)]
pub struct ApiDoc;

/// Create the product router with all HTTP endpoints
pub fn router<R: ProductRepository + 'static>(service: ProductService<R>) -> Router {
    let shared_service = Arc::new(service);

    Router::new()
        .route(
            "/",
            get(list_products::<R>)
                .post(create_product::<R>)
                .put(update_product::<R>),
        )
        .route("/paged", get(list_products_paged::<R>))
        .route(
            "/{id}",
            get(get_product::<R>).delete(delete_product::<R>),
        )
        .with_state(shared_service)
}

/// List all products ordered by id
#[utoipa::path(
    get,
    path = "",
    tag = TAG,
    responses(
        (status = 200, description = "All products", body = Vec<Product>),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn list_products<R: ProductRepository>(
    State(service): State<Arc<ProductService<R>>>,
) -> ProductResult<Json<Vec<Product>>> {
    let products = service.list_products().await?;
    Ok(Json(products))
}

/// List one page of products ordered by id
#[utoipa::path(
    get,
    path = "/paged",
    tag = TAG,
    params(PageRequest),
    responses(
        (status = 200, description = "Requested page", body = Page<Product>),
        (status = 400, response = BadRequestValidationResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn list_products_paged<R: ProductRepository>(
    State(service): State<Arc<ProductService<R>>>,
    ValidatedQuery(request): ValidatedQuery<PageRequest>,
) -> ProductResult<Json<Page<Product>>> {
    let page = service.list_products_page(request).await?;
    Ok(Json(page))
}

/// Get a product by id
#[utoipa::path(
    get,
    path = "/{id}",
    tag = TAG,
    params(
        ("id" = i32, Path, description = "Product id")
    ),
    responses(
        (status = 200, description = "Product found", body = Product),
        (status = 404, description = "Product not found, empty body"),
        (status = 400, response = BadRequestIdResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn get_product<R: ProductRepository>(
    State(service): State<Arc<ProductService<R>>>,
    IdPath(id): IdPath,
) -> ProductResult<Response> {
    let response = match service.get_product(id).await? {
        Some(product) => Json(product).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    };
    Ok(response)
}

/// Create a product
///
/// The `Location` header points at the new product.
#[utoipa::path(
    post,
    path = "",
    tag = TAG,
    request_body = Product,
    responses(
        (status = 201, description = "Product created", body = Product,
            headers(("Location" = String, description = "URI of the new product"))),
        (status = 400, response = BadRequestValidationResponse),
        (status = 409, response = ConflictResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn create_product<R: ProductRepository>(
    State(service): State<Arc<ProductService<R>>>,
    OriginalUri(uri): OriginalUri,
    WithRejection(Json(product), _): WithRejection<Json<Product>, AppError>,
) -> ProductResult<Response> {
    let product = service.create_product(product).await?;
    let location = format!("{}/{}", uri.path().trim_end_matches('/'), product.id);

    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, location)],
        Json(product),
    )
        .into_response())
}

/// Update a product's name
///
/// A missing or `null` body is answered with 204 and changes nothing. An id
/// with no stored product is also left unchanged and answered with 200.
#[utoipa::path(
    put,
    path = "",
    tag = TAG,
    request_body(content = Product, description = "Product to update, may be omitted or null"),
    responses(
        (status = 200, description = "Update applied"),
        (status = 204, description = "No body supplied"),
        (status = 400, response = BadRequestValidationResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn update_product<R: ProductRepository>(
    State(service): State<Arc<ProductService<R>>>,
    OptionalJson(product): OptionalJson<Product>,
) -> ProductResult<StatusCode> {
    let Some(product) = product else {
        return Ok(StatusCode::NO_CONTENT);
    };

    service.update_product(product).await?;
    Ok(StatusCode::OK)
}

/// Delete a product
#[utoipa::path(
    delete,
    path = "/{id}",
    tag = TAG,
    params(
        ("id" = i32, Path, description = "Product id")
    ),
    responses(
        (status = 200, description = "Product deleted"),
        (status = 404, description = "Product not found, empty body"),
        (status = 400, response = BadRequestIdResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn delete_product<R: ProductRepository>(
    State(service): State<Arc<ProductService<R>>>,
    IdPath(id): IdPath,
) -> ProductResult<StatusCode> {
    if service.delete_product(id).await? {
        Ok(StatusCode::OK)
    } else {
        Ok(StatusCode::NOT_FOUND)
    }
}
