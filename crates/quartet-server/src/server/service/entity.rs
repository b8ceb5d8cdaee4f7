use crate::server::{store::EntityStore, streaming::Coordinator};
use quartet_core::{
    Error,
    proto::{
        Blog, CreateBlogRequest, CreateBlogResponse, DeleteBlogRequest, DeleteBlogResponse,
        ReadBlogRequest, ReadBlogResponse, UpdateBlogRequest, UpdateBlogResponse,
        entity_service_server::EntityService,
    },
    types::Entity,
};
use tonic::{Request, Response, Status};

/// Blog CRUD over the configured document store. Every method is unary.
#[derive(Clone)]
pub struct BlogService {
    coordinator: Coordinator,
    store: EntityStore,
}

impl BlogService {
    pub const fn new(coordinator: Coordinator, store: EntityStore) -> Self {
        Self { coordinator, store }
    }
}

fn require_blog(blog: Option<Blog>) -> Result<Entity, Error> {
    blog.map(Entity::from)
        .ok_or_else(|| Error::invalid_argument("missing blog"))
}

#[tonic::async_trait]
impl EntityService for BlogService {
    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all))]
    async fn create(
        &self,
        req: Request<CreateBlogRequest>,
    ) -> Result<Response<CreateBlogResponse>, Status> {
        let store = &self.store;
        let created = self
            .coordinator
            .unary("Create", req.into_inner(), |req| async move {
                store.create(require_blog(req.blog)?).await
            })
            .await?;
        Ok(Response::new(CreateBlogResponse {
            blog: Some(created.into()),
        }))
    }

    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(skip_all, fields(blog_id = %req.get_ref().blog_id))
    )]
    async fn read(
        &self,
        req: Request<ReadBlogRequest>,
    ) -> Result<Response<ReadBlogResponse>, Status> {
        let store = &self.store;
        let found = self
            .coordinator
            .unary("Read", req.into_inner(), |req| async move {
                store.read(&req.blog_id).await
            })
            .await?;
        Ok(Response::new(ReadBlogResponse {
            blog: Some(found.into()),
        }))
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all))]
    async fn update(
        &self,
        req: Request<UpdateBlogRequest>,
    ) -> Result<Response<UpdateBlogResponse>, Status> {
        let store = &self.store;
        let updated = self
            .coordinator
            .unary("Update", req.into_inner(), |req| async move {
                store.update(require_blog(req.blog)?).await
            })
            .await?;
        Ok(Response::new(UpdateBlogResponse {
            blog: Some(updated.into()),
        }))
    }

    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(skip_all, fields(blog_id = %req.get_ref().blog_id))
    )]
    async fn delete(
        &self,
        req: Request<DeleteBlogRequest>,
    ) -> Result<Response<DeleteBlogResponse>, Status> {
        let store = &self.store;
        let blog_id = self
            .coordinator
            .unary("Delete", req.into_inner(), |req| async move {
                store.delete(&req.blog_id).await
            })
            .await?;
        Ok(Response::new(DeleteBlogResponse { blog_id }))
    }
}
